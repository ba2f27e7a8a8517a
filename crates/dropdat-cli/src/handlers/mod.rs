//! HTTP request handlers

pub mod site;
pub mod upgrade;

pub use site::{site_router, SiteOptions, ARCHIVE_KEY_HEADER, ARCHIVE_VERSION_HEADER};
pub use upgrade::upgrade_session;
