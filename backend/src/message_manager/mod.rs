//! Admin notices carried across redirects.
//!
//! Controllers push a message before answering with a redirect; the page the
//! browser lands on drains the queue and shows them once.

pub mod state;
