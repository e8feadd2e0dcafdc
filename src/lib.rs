//! Rate-limited API gateway in front of an identity provider, a credential issuer, and a user
//! store - bearer pass-through, per-identity quotas, and credential-offer proxying in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod limit;
pub mod obs;
pub mod offer;
pub mod provider;
pub mod proxy;
pub mod server;
pub mod store;
pub mod user;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		net::{IpAddr, SocketAddr},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use axum::body::Bytes;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
#[cfg(feature = "server")]
use {color_eyre as _, dotenv as _, tokio as _, tower_http as _, tracing_subscriber as _};
