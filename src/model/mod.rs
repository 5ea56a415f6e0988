pub mod client;
pub mod notification;
pub mod payment;
pub mod quote;
pub mod referral;
pub mod review;
pub mod saved_item;
pub mod user;
