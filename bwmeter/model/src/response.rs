// Copyright (c) Facebook, Inc. and its affiliates.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use serde::Serialize;

use crate::History;
use crate::Sample;
use crate::SampleError;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Current {
    pub rx: f64,
    pub tx: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuccessBody {
    pub label: String,
    pub data: Vec<Sample>,
    pub tx_data: Vec<Sample>,
    pub timestamp: i64,
    pub current: Current,
    pub status: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: &'static str,
}

/// Body of a poll. Failures never carry partial data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success(SuccessBody),
    Error(ErrorBody),
}

impl Response {
    /// Build a success body for `label` from the full session history. The
    /// newest entry is the current sample.
    pub fn success(label: String, history: &History) -> Response {
        let (rx, tx) = history
            .latest()
            .unwrap_or((Sample(0, 0.0), Sample(0, 0.0)));
        Response::Success(SuccessBody {
            label,
            data: history.rx().copied().collect(),
            tx_data: history.tx().copied().collect(),
            timestamp: rx.timestamp(),
            current: Current {
                rx: rx.rate(),
                tx: tx.rate(),
            },
            status: STATUS_SUCCESS,
        })
    }

    pub fn error(err: &SampleError) -> Response {
        Response::Error(ErrorBody {
            error: err.to_string(),
            status: STATUS_ERROR,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
