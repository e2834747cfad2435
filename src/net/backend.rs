//! I/O multiplexing backend selection.
//!
//! The runtime's reactor polls through whatever the target offers. This module
//! reports which mechanism that is so startup can log it and attach it to the
//! server span.
//!
//! Priority: epoll is checked first, then kqueue. When a host reports both,
//! kqueue wins because it is checked last.

use std::fmt;

/// Readiness notification mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Neither epoll nor kqueue; the platform's own default (poll, IOCP, ...).
    Default,
    Kqueue,
    Epoll,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Default => "default",
            Backend::Kqueue => "kqueue",
            Backend::Epoll => "epoll",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanisms a host can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportedBackends {
    pub epoll: bool,
    pub kqueue: bool,
}

impl SupportedBackends {
    /// What the compilation target supports.
    pub const fn host() -> Self {
        Self {
            epoll: cfg!(any(
                target_os = "linux",
                target_os = "android",
                target_os = "illumos",
                target_os = "redox"
            )),
            kqueue: cfg!(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "tvos",
                target_os = "watchos",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly"
            )),
        }
    }
}

/// Pick a backend from the supported set.
pub fn select(supported: SupportedBackends) -> Backend {
    let mut backend = Backend::Default;
    if supported.epoll {
        backend = Backend::Epoll;
    }
    if supported.kqueue {
        backend = Backend::Kqueue;
    }
    backend
}

/// Select the host's backend and log the decision.
pub fn select_host_backend() -> Backend {
    tracing::debug!("Backend decision process");
    let backend = select(SupportedBackends::host());
    match backend {
        Backend::Kqueue => tracing::debug!("KQUEUE is supported, enabling it"),
        Backend::Epoll => tracing::debug!("EPOLL is supported, enabling it"),
        Backend::Default => {
            tracing::debug!("Neither EPOLL nor KQUEUE detected, using the platform default")
        }
    }
    backend
}
