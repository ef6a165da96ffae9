//! Prints a fresh API key for the `API_KEYS` allow-list.

use vision_gateway::security::{generate_api_key, key_fingerprint};

fn main() {
    let key = generate_api_key();
    println!("{}", key);
    eprintln!("fingerprint: {}", key_fingerprint(&key));
}
