pub mod notification;
pub mod plan;
pub mod referral;
pub mod subscription;
pub mod user;
pub mod webhook;
