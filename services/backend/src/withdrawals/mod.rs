pub mod eligibility;
pub mod service;

pub use eligibility::EligibilityPolicy;
pub use service::WithdrawalService;
