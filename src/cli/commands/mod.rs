mod fix_subscription;
mod init;
mod migrate;
mod reset_tokens;

pub use fix_subscription::cmd_fix_subscription;
pub use init::cmd_init;
pub use migrate::cmd_migrate;
pub use reset_tokens::cmd_reset_tokens;
