//! Token-gated delivery of discovered media URLs

pub mod grant;
pub mod hosts;
pub mod proxy;

pub use grant::{DownloadGrant, GrantCodec, GrantError, HmacGrantCodec};
pub use hosts::{HostDecision, HostPolicy};
pub use proxy::{Delivery, DownloadProxy, ProxiedStream, ProxyError};
