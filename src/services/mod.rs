pub mod asaas;
pub mod billing_period;
pub mod database;
pub mod proration;
pub mod referral;
pub mod subscription;

#[cfg(test)]
pub mod test_support;
