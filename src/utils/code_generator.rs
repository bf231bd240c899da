use rand::Rng;
use uuid::Uuid;

// Excludes 0/O and 1/I
const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Six-digit numeric code for email verification
pub fn generate_six_digit_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(100000..=999999))
}

/// Eight-character referral code; uniqueness is checked by the caller
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

/// Opaque single-use password reset token
pub fn generate_reset_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
