use rand::Rng;

pub const REFERRAL_CODE_LENGTH: usize = 8;

// No 0/O or 1/I: codes get read aloud and typed by hand.
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Codes are matched case-insensitively and ignoring surrounding whitespace.
pub fn normalize_referral_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
