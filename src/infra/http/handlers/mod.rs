mod health;
mod invalidate;
mod lookup;
mod status;
mod switches;

pub use health::healthcheck;
pub use invalidate::post_invalidate;
pub use lookup::{post_lookup, post_update};
pub use status::get_status;
pub use switches::{
    disable_invalidate, disable_precompute, disable_update, enable_invalidate, enable_precompute,
    enable_update, put_quota,
};
