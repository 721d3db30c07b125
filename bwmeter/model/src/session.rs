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


use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use std::time::Instant;

use common::util::get_unix_timestamp_millis;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::History;
use crate::RatePoint;

/// Opaque session identifier, handed to browsers in a cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn new_random() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Session {
    history: History,
    last_seen: Instant,
}

/// Per-session rate histories.
///
/// Sessions are created on first use, reset on page load, and dropped once
/// idle for longer than the ttl. Expired sessions are swept whenever the
/// store is touched. Ids a client sends that we do not know are never
/// adopted; a fresh one is issued instead.
///
/// Everything happens under one lock. A record stamps its timestamp and
/// appends both directions in the same critical section, so concurrent
/// polls of one session (duplicate tabs) interleave whole samples in
/// timestamp order.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    history_len: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(history_len: usize, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_len,
            ttl,
        }
    }

    fn new_session(&self, sessions: &mut HashMap<SessionId, Session>, now: Instant) -> SessionId {
        let id = SessionId::new_random();
        sessions.insert(
            id.clone(),
            Session {
                history: History::new(self.history_len),
                last_seen: now,
            },
        );
        id
    }

    fn sweep(&self, sessions: &mut HashMap<SessionId, Session>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, session| now.saturating_duration_since(session.last_seen) <= self.ttl);
        before - sessions.len()
    }

    /// Continue the session named by `id`, or start a new one if it is
    /// absent, unknown or expired.
    pub fn touch_or_create(&self, id: Option<&str>) -> SessionId {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        self.sweep(&mut sessions, now);
        if let Some(id) = id {
            let id = SessionId(id.to_string());
            if let Some(session) = sessions.get_mut(&id) {
                session.last_seen = now;
                return id;
            }
        }
        self.new_session(&mut sessions, now)
    }

    /// Destroy the session named by `id`, if any, and start a fresh one.
    pub fn reset(&self, id: Option<&str>) -> SessionId {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        self.sweep(&mut sessions, now);
        if let Some(id) = id {
            sessions.remove(&SessionId(id.to_string()));
        }
        self.new_session(&mut sessions, now)
    }

    /// Stamp `point` with the current wall-clock time, append it to the
    /// session's history and return a copy of the updated history. A session
    /// that expired while being measured is recreated under the same id.
    pub fn record(&self, id: &SessionId, point: RatePoint) -> History {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let history_len = self.history_len;
        let session = sessions.entry(id.clone()).or_insert_with(|| Session {
            history: History::new(history_len),
            last_seen: now,
        });
        session.last_seen = now;
        session.history.push(get_unix_timestamp_millis(), point);
        session.history.clone()
    }

    pub fn history(&self, id: &SessionId) -> Option<History> {
        self.sessions
            .lock()
            .get(id)
            .map(|session| session.history.clone())
    }

    /// Drop sessions idle at `now` for longer than the ttl. Returns how many
    /// were dropped.
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        self.sweep(&mut sessions, now)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
