//! Test fixtures for generating test data.

use uuid::Uuid;

pub const UA_BLACKBERRY: &str = "BlackBerry9900/5.1.0.692";
pub const UA_PLAIN: &str = "Mozilla/5.0";
pub const UA_ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36";
pub const UA_ANDROID_WEBAPK: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Mobile Safari/537.36";
pub const UA_ANDROID_HOMESCREEN: &str = "Mozilla/5.0 (Linux; Android 10; Pixel 3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Mobile Safari/537.36";
pub const UA_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1";

/// Generate a fresh client instance id.
#[allow(dead_code)]
pub fn new_inst_id() -> String {
    Uuid::new_v4().to_string()
}
