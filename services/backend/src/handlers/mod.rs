pub mod accounts;
pub mod admin;
pub mod games;
pub mod health;
pub mod withdrawals;
