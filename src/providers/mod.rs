//! Mail transport implementations.
//!
//! Each provider implements [`Mailer`](crate::Mailer) and
//! [`Connector`](crate::Connector).
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`SmtpMailer`] | `smtp` | SMTP via lettre; the builder opens a fresh transport per message |
//! | [`LocalMailer`] | `local` | In-memory capture with failure simulation |
//! | [`LoggerMailer`] | (none) | Logs messages without sending |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpBuilder, SmtpMailer, TlsMode};

#[cfg(feature = "local")]
mod local;
#[cfg(feature = "local")]
pub use local::LocalMailer;

mod logger;
pub use logger::LoggerMailer;
