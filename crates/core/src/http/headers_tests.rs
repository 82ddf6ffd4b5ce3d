// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn lookup_is_case_insensitive() {
    let mut headers = HeaderMap::new();
    headers.append("Content-Type", "text/plain");
    assert_eq!(headers.get("content-type"), Some("text/plain"));
    assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
    assert_eq!(headers.get("content-length"), None);
}

#[test]
fn iteration_preserves_insertion_order() {
    let mut headers = HeaderMap::new();
    headers.append("Host", "x");
    headers.append("Accept", "*/*");
    headers.append("X-One", "1");
    let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["Host", "Accept", "X-One"]);
}

#[test]
fn duplicates_are_kept_and_folded_with_comma() {
    let mut headers = HeaderMap::new();
    headers.append("Accept", "text/html");
    headers.append("accept", "application/json");
    assert_eq!(headers.get("Accept"), Some("text/html"));
    assert_eq!(headers.values("Accept").count(), 2);
    assert_eq!(headers.folded("accept").as_deref(), Some("text/html, application/json"));
}

#[test]
fn set_cookie_is_never_folded() {
    let mut headers = HeaderMap::new();
    headers.append("Set-Cookie", "a=1");
    headers.append("Set-Cookie", "b=2");
    assert_eq!(headers.folded("set-cookie").as_deref(), Some("a=1"));
    assert_eq!(headers.values("Set-Cookie").count(), 2);
}

#[test]
fn set_replaces_all_duplicates() {
    let mut headers = HeaderMap::new();
    headers.append("X-Remote-IP", "1.2.3.4");
    headers.append("x-remote-ip", "5.6.7.8");
    headers.set("X-Remote-IP", "9.9.9.9");
    assert_eq!(headers.values("X-Remote-IP").count(), 1);
    assert_eq!(headers.get("X-Remote-IP"), Some("9.9.9.9"));
}

#[test]
fn has_token_splits_on_commas() {
    let mut headers = HeaderMap::new();
    headers.append("Connection", "keep-alive, Upgrade");
    assert!(headers.has_token("connection", "keep-alive"));
    assert!(headers.has_token("connection", "upgrade"));
    assert!(!headers.has_token("connection", "close"));
}

#[test]
fn folded_absent_header_is_none() {
    let headers = HeaderMap::new();
    assert_eq!(headers.folded("anything"), None);
}
