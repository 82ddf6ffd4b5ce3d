// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP date formatting (IMF-fixdate, RFC 7231 §7.1.1.1).

use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Format a timestamp as an IMF-fixdate, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
pub fn imf_fixdate(time: SystemTime) -> String {
    let utc: DateTime<Utc> = time.into();
    utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
