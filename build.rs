//! Build script for ruledeck
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! logged at startup and shown by `ruledeck --version`.

fn main() {
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
