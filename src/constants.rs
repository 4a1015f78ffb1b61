pub const FREE_MONTHLY_TOKENS: i32 = 50;

pub const PRO_MONTHLY_TOKENS: i32 = 1_000;

pub const ENTERPRISE_MONTHLY_TOKENS: i32 = 5_000;

pub const IMAGE_GENERATION_COST: i32 = 10;

pub const REPURPOSE_COST: i32 = 1;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub const OPENAI_API_BASE: &str = "https://api.openai.com";

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

pub const YOUTUBE_TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

pub mod limits {

    pub const DEFAULT_HISTORY_LIMIT: u64 = 20;

    pub const MAX_HISTORY_LIMIT: u64 = 100;

    pub const MAX_PROMPT_CHARS: usize = 4_000;
}

pub mod session {

    pub const USER_KEY: &str = "user_id";

    pub const EMAIL_KEY: &str = "email";
}
