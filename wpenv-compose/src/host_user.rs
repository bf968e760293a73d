//! Host user identity baked into the compose services.

/// The user the WordPress and CLI containers run file operations as, so
/// files written into mounted sources keep host ownership.
#[derive(Debug, Clone)]
pub struct HostUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

impl HostUser {
    #[cfg(unix)]
    pub fn current() -> Self {
        use nix::unistd::{Gid, Uid, User};

        let uid = Uid::current();
        let gid = Gid::current();
        let name = User::from_uid(uid)
            .ok()
            .flatten()
            .map(|user| user.name)
            .unwrap_or_else(|| "root".to_string());

        Self {
            name,
            uid: uid.as_raw(),
            gid: gid.as_raw(),
        }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self {
            name: "wpenv".to_string(),
            uid: 1000,
            gid: 1000,
        }
    }

    /// Compose `user:` entry.
    pub fn user_entry(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }

    /// The named-volume mount backing the container home directory.
    pub fn home_mount(&self) -> String {
        if self.name == "root" {
            "user-home:/root".to_string()
        } else {
            format!("user-home:/home/{}", self.name)
        }
    }
}
