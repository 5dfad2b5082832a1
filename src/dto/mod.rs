pub mod health;
pub mod history;
pub mod live;
pub mod sse;
pub mod validation;
