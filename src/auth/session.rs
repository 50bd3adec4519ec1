//! Cookie sessions with one-shot flash messages
//!
//! Sessions live in process memory keyed by a random id carried in the
//! `bmi_session` cookie. A session is only stored once something is written
//! to it, and the cookie is only issued for stored sessions. The store is
//! bounded: idle sessions expire and the least recently used one is evicted
//! when the store is full.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "bmi_session";

/// Sessions untouched for this long are dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on stored sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Danger,
    Info,
    Warning,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashCategory::Success => "success",
            FlashCategory::Danger => "danger",
            FlashCategory::Info => "info",
            FlashCategory::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug, Clone)]
struct SessionData {
    user: Option<String>,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            user: None,
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

/// All live sessions
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
    secure_cookies: bool,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SessionStore {
    pub fn new(secure_cookies: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            secure_cookies,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_limits(mut self, idle_timeout: Duration, max_sessions: usize) -> Self {
        self.idle_timeout = idle_timeout;
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Whether `id` names a live (stored and not expired) session
    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .get(id)
            .is_some_and(|data| data.last_seen.elapsed() < self.idle_timeout)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Set-Cookie` value for session `id`
    pub fn cookie_header(&self, id: &str) -> String {
        let secure = if self.secure_cookies { "; Secure" } else { "" };
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax{}", SESSION_COOKIE, id, secure)
    }

    /// Refresh `id`; false (and the entry dropped) when it is unknown or expired
    fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(id) {
            Some(data) if data.last_seen.elapsed() < self.idle_timeout => {
                data.last_seen = Instant::now();
                true
            }
            Some(_) => {
                sessions.remove(id);
                false
            }
            None => false,
        }
    }

    /// Run `f` on the entry for `id`, creating it if needed
    fn update<R>(&self, id: &str, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(id) {
            self.make_room(&mut sessions);
        }
        let data = sessions.entry(id.to_string()).or_default();
        data.last_seen = Instant::now();
        f(data)
    }

    /// Insert `data` under `id`, evicting if needed
    fn insert(&self, sessions: &mut HashMap<String, SessionData>, id: String, data: SessionData) {
        if !sessions.contains_key(&id) {
            self.make_room(sessions);
        }
        sessions.insert(id, data);
    }

    /// Drop expired sessions, then the least recently seen ones until a new
    /// entry fits
    fn make_room(&self, sessions: &mut HashMap<String, SessionData>) {
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, data| data.last_seen.elapsed() < idle_timeout);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, data)| data.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }
}

/// Per-request handle on one session, inserted as a request extension by
/// [`session_layer`]
///
/// Clones share the id, so a rotation done by a handler is seen by the
/// middleware when it issues the cookie.
#[derive(Debug, Clone)]
pub struct Session {
    id: Arc<Mutex<String>>,
    store: Arc<SessionStore>,
}

impl Session {
    fn new(id: String, store: Arc<SessionStore>) -> Self {
        Self {
            id: Arc::new(Mutex::new(id)),
            store,
        }
    }

    pub fn id(&self) -> String {
        self.id.lock().clone()
    }

    /// Email of the logged-in user
    pub fn user(&self) -> Option<String> {
        let id = self.id();
        self.store
            .sessions
            .read()
            .get(&id)
            .and_then(|data| data.user.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.user().is_some()
    }

    /// Mark the session as logged in under a fresh id; pending flashes carry over
    pub fn login(&self, email: &str) {
        let mut id = self.id.lock();
        let mut sessions = self.store.sessions.write();
        let mut data = sessions.remove(id.as_str()).unwrap_or_default();
        data.user = Some(email.to_string());
        data.last_seen = Instant::now();

        let fresh = Uuid::new_v4().to_string();
        self.store.insert(&mut sessions, fresh.clone(), data);
        *id = fresh;
    }

    /// Remove the session; later writes go to a fresh id
    pub fn clear(&self) {
        let mut id = self.id.lock();
        self.store.sessions.write().remove(id.as_str());
        *id = Uuid::new_v4().to_string();
    }

    pub fn flash(&self, category: FlashCategory, message: impl Into<String>) {
        let id = self.id();
        let message = message.into();
        self.store.update(&id, |data| data.flashes.push(Flash { category, message }));
    }

    /// Pending flashes, removed from the session. An anonymous session left
    /// with nothing in it is dropped.
    pub fn take_flashes(&self) -> Vec<Flash> {
        let id = self.id();
        let mut sessions = self.store.sessions.write();
        let Some(data) = sessions.get_mut(&id) else {
            return Vec::new();
        };
        let flashes = std::mem::take(&mut data.flashes);
        if data.user.is_none() {
            sessions.remove(&id);
        }
        flashes
    }
}

/// Session id from the `Cookie` header, if any
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Attach a [`Session`] to every request and issue the cookie whenever the
/// stored session id differs from the one the client sent
pub async fn session_layer(
    State(store): State<Arc<SessionStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = session_id_from_headers(request.headers()).filter(|id| store.touch(id));
    let id = existing.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    let session = Session::new(id, Arc::clone(&store));
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let current = session.id();
    if existing.as_deref() != Some(current.as_str()) && store.contains(&current) {
        if let Ok(value) = HeaderValue::from_str(&store.cookie_header(&current)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
