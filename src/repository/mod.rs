pub mod client_repo;
pub mod database;
pub mod notification_repo;
pub mod payment_repo;
pub mod quote_repo;
pub mod referral_repo;
pub mod repository_error;
pub mod review_repo;
pub mod saved_item_repo;
pub mod user_repo;
