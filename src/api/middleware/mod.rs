//! Middleware stack for protected routes: Auth → Role → Audit → Handler.

pub mod audit;
pub mod auth;
