use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

/// The four actor kinds with distinct login flows and protected views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Staff,
    Trainer,
    Applicant,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Staff, Role::Trainer, Role::Applicant];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Trainer => "trainer",
            Role::Applicant => "applicant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "trainer" => Some(Role::Trainer),
            "applicant" => Some(Role::Applicant),
            _ => None,
        }
    }

    /// Whether this role's credential survives a daemon restart. Admin
    /// and trainer sessions persist; staff and applicant sessions live
    /// only as long as the process.
    pub fn persists(self) -> bool {
        matches!(self, Role::Admin | Role::Trainer)
    }
}

/// Token plus the user profile the backend issued with it. Valid only as
/// a pair; `SessionManager::credential` never returns half a record.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub user: Value,
}

/// Storage for per-role credential records. Both fields of a record are
/// written and removed together.
pub trait CredentialStore {
    fn load(&self, role: Role) -> Result<Option<(String, String)>>;
    fn save(&mut self, role: Role, token: &str, user_json: &str) -> Result<()>;
    fn clear(&mut self, role: Role) -> Result<()>;
}

/// Process-lifetime store. Dropping the daemon drops these sessions,
/// which is the tab-scoped behavior of the original storage keys.
#[derive(Default)]
pub struct MemoryStore {
    records: HashMap<Role, (String, String)>,
}

impl CredentialStore for MemoryStore {
    fn load(&self, role: Role) -> Result<Option<(String, String)>> {
        Ok(self.records.get(&role).cloned())
    }

    fn save(&mut self, role: Role, token: &str, user_json: &str) -> Result<()> {
        self.records
            .insert(role, (token.to_string(), user_json.to_string()));
        Ok(())
    }

    fn clear(&mut self, role: Role) -> Result<()> {
        self.records.remove(&role);
        Ok(())
    }
}

/// Credential rows in `credentials.sqlite3` under the profile directory.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(profile_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(profile_dir)?;
        let conn = Connection::open(profile_dir.join("credentials.sqlite3"))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS credentials(
                role TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                user_json TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl CredentialStore for SqliteStore {
    fn load(&self, role: Role) -> Result<Option<(String, String)>> {
        let row = self
            .conn
            .query_row(
                "SELECT token, user_json FROM credentials WHERE role = ?",
                [role.as_str()],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn save(&mut self, role: Role, token: &str, user_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO credentials(role, token, user_json)
             VALUES(?, ?, ?)
             ON CONFLICT(role) DO UPDATE SET
               token = excluded.token,
               user_json = excluded.user_json",
            (role.as_str(), token, user_json),
        )?;
        Ok(())
    }

    fn clear(&mut self, role: Role) -> Result<()> {
        self.conn
            .execute("DELETE FROM credentials WHERE role = ?", [role.as_str()])?;
        Ok(())
    }
}

/// Owns the credential lifecycle for every role. Each role state machine
/// is independent: LoggedOut -> login -> LoggedIn -> logout or a backend
/// 401 -> LoggedOut. There is no refresh transition.
pub struct SessionManager {
    memory: MemoryStore,
    persistent: Option<SqliteStore>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            memory: MemoryStore::default(),
            persistent: None,
        }
    }

    /// Attaches the on-disk store once a profile directory is selected.
    /// Credentials that persistent roles acquired before this point are
    /// migrated over so they survive the next restart.
    pub fn attach_persistent(&mut self, mut store: SqliteStore) {
        for role in Role::ALL {
            if !role.persists() {
                continue;
            }
            let (token, user_json) = match self.memory.load(role) {
                Ok(Some(v)) => v,
                _ => continue,
            };
            match store.save(role, &token, &user_json) {
                Ok(()) => {
                    let _ = self.memory.clear(role);
                }
                Err(e) => {
                    warn!(
                        "could not migrate {} credential to disk: {}",
                        role.as_str(),
                        e
                    );
                }
            }
        }
        self.persistent = Some(store);
    }

    fn store(&self, role: Role) -> &dyn CredentialStore {
        match &self.persistent {
            Some(p) if role.persists() => p,
            _ => &self.memory,
        }
    }

    fn store_mut(&mut self, role: Role) -> &mut dyn CredentialStore {
        match &mut self.persistent {
            Some(p) if role.persists() => p,
            _ => &mut self.memory,
        }
    }

    pub fn login(&mut self, role: Role, token: &str, user: &Value) -> Result<()> {
        let user_json = serde_json::to_string(user)?;
        self.store_mut(role).save(role, token, &user_json)?;
        info!("{} logged in", role.as_str());
        Ok(())
    }

    pub fn logout(&mut self, role: Role) -> Result<()> {
        self.store_mut(role).clear(role)?;
        info!("{} logged out", role.as_str());
        Ok(())
    }

    /// Returns the credential iff the stored record is whole: token
    /// present, user JSON parseable, and `user.role` equal to the
    /// expected role string exactly. Anything less is treated as
    /// unauthenticated and the record is cleared so a corrupt entry
    /// cannot wedge a login flow.
    pub fn credential(&mut self, role: Role) -> Option<Credential> {
        let (token, user_json) = match self.store(role).load(role) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!("credential load failed for {}: {}", role.as_str(), e);
                return None;
            }
        };
        if token.trim().is_empty() {
            let _ = self.store_mut(role).clear(role);
            return None;
        }
        let user: Value = match serde_json::from_str(&user_json) {
            Ok(v) => v,
            Err(_) => {
                let _ = self.store_mut(role).clear(role);
                return None;
            }
        };
        if user.get("role").and_then(|v| v.as_str()) != Some(role.as_str()) {
            let _ = self.store_mut(role).clear(role);
            return None;
        }
        Some(Credential { token, user })
    }

    pub fn is_authenticated(&mut self, role: Role) -> bool {
        self.credential(role).is_some()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_profile(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn user_for(role: Role) -> Value {
        json!({
            "id": 1,
            "name": "Avery Cole",
            "email": "avery@tracked.test",
            "role": role.as_str(),
        })
    }

    #[test]
    fn login_then_status_then_logout() {
        let mut sessions = SessionManager::new();
        let role = Role::Staff;
        assert!(!sessions.is_authenticated(role));

        sessions
            .login(role, "tok-1", &user_for(role))
            .expect("login");
        assert!(sessions.is_authenticated(role));
        let cred = sessions.credential(role).expect("credential");
        assert_eq!(cred.token, "tok-1");
        assert_eq!(cred.user["email"], "avery@tracked.test");

        sessions.logout(role).expect("logout");
        assert!(!sessions.is_authenticated(role));
        assert!(sessions.credential(role).is_none());
    }

    #[test]
    fn roles_are_independent() {
        let mut sessions = SessionManager::new();
        sessions
            .login(Role::Staff, "tok-staff", &user_for(Role::Staff))
            .expect("login");
        assert!(sessions.is_authenticated(Role::Staff));
        assert!(!sessions.is_authenticated(Role::Applicant));

        sessions.logout(Role::Staff).expect("logout");
        assert!(!sessions.is_authenticated(Role::Staff));
    }

    #[test]
    fn role_mismatch_is_unauthenticated_and_cleared() {
        let mut sessions = SessionManager::new();
        // Token stored under staff, but the profile says applicant.
        sessions
            .login(Role::Staff, "tok-x", &user_for(Role::Applicant))
            .expect("login");
        assert!(!sessions.is_authenticated(Role::Staff));
        // The defensive clear removed the record entirely.
        assert!(matches!(sessions.memory.load(Role::Staff), Ok(None)));
    }

    #[test]
    fn corrupt_user_json_is_unauthenticated_and_cleared() {
        let mut sessions = SessionManager::new();
        sessions
            .memory
            .save(Role::Applicant, "tok-y", "{not json")
            .expect("save");
        assert!(!sessions.is_authenticated(Role::Applicant));
        assert!(matches!(sessions.memory.load(Role::Applicant), Ok(None)));
    }

    #[test]
    fn empty_token_is_unauthenticated() {
        let mut sessions = SessionManager::new();
        sessions
            .memory
            .save(Role::Staff, "  ", &user_for(Role::Staff).to_string())
            .expect("save");
        assert!(!sessions.is_authenticated(Role::Staff));
    }

    #[test]
    fn persistent_roles_survive_reopen() {
        let dir = temp_profile("tracked-session");
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("open store"));
            sessions
                .login(Role::Trainer, "tok-t", &user_for(Role::Trainer))
                .expect("login");
        }
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("reopen store"));
            let cred = sessions.credential(Role::Trainer).expect("persisted");
            assert_eq!(cred.token, "tok-t");

            sessions.logout(Role::Trainer).expect("logout");
        }
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("reopen store"));
            assert!(!sessions.is_authenticated(Role::Trainer));
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn tab_scoped_roles_do_not_touch_disk() {
        let dir = temp_profile("tracked-session-tab");
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("open store"));
            sessions
                .login(Role::Applicant, "tok-a", &user_for(Role::Applicant))
                .expect("login");
        }
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("reopen store"));
            assert!(!sessions.is_authenticated(Role::Applicant));
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn attach_migrates_staged_persistent_logins() {
        let dir = temp_profile("tracked-session-migrate");
        {
            let mut sessions = SessionManager::new();
            // Login lands in memory because no profile is selected yet.
            sessions
                .login(Role::Admin, "tok-adm", &user_for(Role::Admin))
                .expect("login");
            sessions.attach_persistent(SqliteStore::open(&dir).expect("open store"));
            assert!(sessions.is_authenticated(Role::Admin));
        }
        {
            let mut sessions = SessionManager::new();
            sessions.attach_persistent(SqliteStore::open(&dir).expect("reopen store"));
            assert!(sessions.is_authenticated(Role::Admin));
        }
        let _ = std::fs::remove_dir_all(dir);
    }
}
