pub mod db_retry;
pub mod email;
pub mod error;
pub mod firebase;
pub mod jwt;
pub mod logger;
pub mod money;
pub mod password;
pub mod referral_code;
