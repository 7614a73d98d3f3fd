// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use super::*;

fn seg(a: usize, b: usize) -> SegmentLocation {
    SegmentLocation::new(PointLocation::new(1, a as CaretCol + 1, a), PointLocation::new(1, b as CaretCol + 1, b))
}

#[test]
fn advance_lines() {
    let p = PointLocation::new(1, 1, 0).advance("ab\ncd");
    assert_eq!(p, PointLocation::new(2, 3, 5));
    let p = p.advance("é");
    assert_eq!(p, PointLocation::new(2, 4, 7));
}

#[test]
fn includes_overlaps() {
    let outer = seg(2, 10);
    assert!(outer.includes(&seg(2, 10)));
    assert!(outer.includes(&seg(4, 6)));
    assert!(!outer.includes(&seg(1, 6)));
    assert!(outer.overlaps(&seg(8, 12)));
    assert!(!outer.overlaps(&seg(10, 12)));
    assert!(!outer.overlaps(&seg(0, 2)));
    assert!(outer.crosses(&seg(8, 12)));
    assert!(!outer.crosses(&seg(4, 6)));
    assert!(!seg(4, 6).crosses(&outer));
}

#[test]
fn merge_segments() {
    assert_eq!(seg(2, 4).merge(&seg(6, 9)), seg(2, 9));
    assert_eq!(SegmentLocation::smart_merge(None, Some(seg(1, 3))), Some(seg(1, 3)));
    assert_eq!(SegmentLocation::smart_merge(Some(seg(5, 7)), Some(seg(1, 3))), Some(seg(1, 7)));
    assert_eq!(SegmentLocation::smart_merge(None, None), None);
}

#[test]
fn extract_text() {
    let text = "let x = 12;";
    assert_eq!(seg(4, 5).extract(text), "x");
    assert_eq!(seg(8, 11).extract(text), "12;");
    assert_eq!(seg(8, 40).extract(text), "");
}
