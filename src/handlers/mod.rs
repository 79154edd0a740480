pub mod checkout;
pub mod notification;
pub mod subscription;
pub mod user;
pub mod webhook;
