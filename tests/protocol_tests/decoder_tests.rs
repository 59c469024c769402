//! Decoder Tests
//!
//! Tests for incremental reply decoding.

use bytes::Bytes;
use redwire::protocol::{
    Decoded, DecoderLimits, ErrorClass, ProtocolError, Reply, ReplyDecoder, ServerError,
};

fn decode_all(decoder: &mut ReplyDecoder, data: &[u8]) -> Vec<Decoded> {
    decoder.decode(data).collect()
}

fn decode_fresh(data: &[u8]) -> Vec<Decoded> {
    decode_all(&mut ReplyDecoder::new(), data)
}

/// A stream exercising every reply kind
const MIXED_STREAM: &[u8] = b"+PONG\r\n\
    -ERR unknown command 'FOO'\r\n\
    :-42\r\n\
    $5\r\nhello\r\n\
    $-1\r\n\
    $0\r\n\r\n\
    *-1\r\n\
    *0\r\n\
    *3\r\n$3\r\nbar\r\n*2\r\n:1\r\n$-1\r\n+OK\r\n";

fn mixed_expected() -> Vec<Decoded> {
    vec![
        Ok(Reply::status("PONG")),
        Ok(Reply::Error(ServerError::new(
            Some(ErrorClass::Err),
            "unknown command 'FOO'",
        ))),
        Ok(Reply::Integer(-42)),
        Ok(Reply::bulk("hello")),
        Ok(Reply::BulkString(None)),
        Ok(Reply::bulk("")),
        Ok(Reply::Array(None)),
        Ok(Reply::Array(Some(vec![]))),
        Ok(Reply::Array(Some(vec![
            Reply::bulk("bar"),
            Reply::Array(Some(vec![Reply::Integer(1), Reply::BulkString(None)])),
            Reply::status("OK"),
        ]))),
    ]
}

// =============================================================================
// Basic Reply Tests
// =============================================================================

#[test]
fn test_mixed_stream_in_one_feed() {
    assert_eq!(decode_fresh(MIXED_STREAM), mixed_expected());
}

#[test]
fn test_simple_string() {
    assert_eq!(decode_fresh(b"+OK\r\n"), vec![Ok(Reply::status("OK"))]);
}

#[test]
fn test_integer_extremes() {
    let out = decode_fresh(b":9223372036854775807\r\n:-9223372036854775808\r\n:0\r\n");
    assert_eq!(
        out,
        vec![
            Ok(Reply::Integer(i64::MAX)),
            Ok(Reply::Integer(i64::MIN)),
            Ok(Reply::Integer(0)),
        ]
    );
}

#[test]
fn test_null_bulk_differs_from_empty_bulk() {
    let out = decode_fresh(b"$-1\r\n$0\r\n\r\n");
    assert_eq!(out[0], Ok(Reply::BulkString(None)));
    assert_eq!(out[1], Ok(Reply::BulkString(Some(Bytes::new()))));
    assert_ne!(out[0], out[1]);
}

#[test]
fn test_null_array_differs_from_empty_array() {
    let out = decode_fresh(b"*-1\r\n*0\r\n");
    assert_eq!(out[0], Ok(Reply::Array(None)));
    assert_eq!(out[1], Ok(Reply::Array(Some(Vec::new()))));
}

#[test]
fn test_binary_safe_bulk() {
    let out = decode_fresh(b"$6\r\n\x00\xff\r\n\x01\x02\r\n");
    assert_eq!(out, vec![Ok(Reply::bulk(b"\x00\xff\r\n\x01\x02"))]);
}

#[test]
fn test_empty_lines_are_skipped() {
    let out = decode_fresh(b"\r\n\r\n+OK\r\n\r\n:1\r\n");
    assert_eq!(out, vec![Ok(Reply::status("OK")), Ok(Reply::Integer(1))]);
}

#[test]
fn test_nested_array_is_one_reply() {
    let out = decode_fresh(b"*2\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n");
    assert_eq!(
        out,
        vec![Ok(Reply::Array(Some(vec![
            Reply::Array(Some(vec![Reply::bulk("a"), Reply::bulk("b")])),
            Reply::bulk("c"),
        ])))]
    );
}

// =============================================================================
// Error Reply Tests
// =============================================================================

#[test]
fn test_error_class_stripped() {
    let out = decode_fresh(b"-ERR wrong number of arguments\r\n");
    match &out[0] {
        Ok(Reply::Error(err)) => {
            assert_eq!(err.class(), Some(ErrorClass::Err));
            assert_eq!(err.message(), "wrong number of arguments");
        }
        other => panic!("Expected error reply, got {:?}", other),
    }
}

#[test]
fn test_wrongtype_kept_verbatim() {
    let out = decode_fresh(b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n");
    match &out[0] {
        Ok(Reply::Error(err)) => {
            assert_eq!(err.class(), None);
            assert_eq!(
                err.message(),
                "WRONGTYPE Operation against a key holding the wrong kind of value"
            );
        }
        other => panic!("Expected error reply, got {:?}", other),
    }
}

#[test]
fn test_nested_error_element_is_kept() {
    let out = decode_fresh(b"*2\r\n+OK\r\n-NOSCRIPT No matching script\r\n");
    let items = match &out[0] {
        Ok(Reply::Array(Some(items))) => items.clone(),
        other => panic!("Expected array, got {:?}", other),
    };
    assert_eq!(items[0], Reply::status("OK"));
    assert!(items[1].is_error());
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_bad_integer_fails_one_slot() {
    let out = decode_fresh(b":abc\r\n+OK\r\n");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], Err(ProtocolError::InvalidInteger("abc".to_string())));
    assert_eq!(out[1], Ok(Reply::status("OK")));
}

#[test]
fn test_malformed_bulk_length() {
    let out = decode_fresh(b"$abc\r\n:1\r\n");
    assert!(matches!(out[0], Err(ProtocolError::InvalidLength { kind: "bulk", .. })));
    assert_eq!(out[1], Ok(Reply::Integer(1)));
}

#[test]
fn test_negative_length_other_than_null() {
    let out = decode_fresh(b"*-2\r\n");
    assert!(matches!(out[0], Err(ProtocolError::InvalidLength { kind: "array", .. })));
}

#[test]
fn test_unknown_type_byte() {
    let out = decode_fresh(b"?what\r\n:5\r\n");
    assert_eq!(out[0], Err(ProtocolError::UnknownType(b'?')));
    assert_eq!(out[1], Ok(Reply::Integer(5)));
}

#[test]
fn test_malformed_element_poisons_array_but_stream_continues() {
    let out = decode_fresh(b"*3\r\n:1\r\n:x\r\n$2\r\nok\r\n+NEXT\r\n");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], Err(ProtocolError::InvalidInteger("x".to_string())));
    assert_eq!(out[1], Ok(Reply::status("NEXT")));
}

#[test]
fn test_bulk_without_terminator() {
    let out = decode_fresh(b"$3\r\nfooXY:1\r\n");
    assert_eq!(out[0], Err(ProtocolError::MissingTerminator));
    assert_eq!(out[1], Ok(Reply::Integer(1)));
}

#[test]
fn test_limits_applied() {
    let limits = DecoderLimits {
        max_bulk_len: 3,
        max_array_len: 2,
        ..DecoderLimits::default()
    };
    let mut decoder = ReplyDecoder::with_limits(limits);
    let out = decode_all(&mut decoder, b"$5\r\nhello\r\n*3\r\n:1\r\n:2\r\n:3\r\n$3\r\nabc\r\n");
    assert_eq!(out.len(), 3);
    assert!(matches!(out[0], Err(ProtocolError::TooLarge { kind: "bulk string", .. })));
    assert!(matches!(out[1], Err(ProtocolError::TooLarge { kind: "array", .. })));
    assert_eq!(out[2], Ok(Reply::bulk("abc")));
}

#[test]
fn test_overlong_line_fails_one_slot() {
    let limits = DecoderLimits {
        max_line_len: 8,
        ..DecoderLimits::default()
    };
    let mut decoder = ReplyDecoder::with_limits(limits);
    let out = decode_all(&mut decoder, b"+0123456789\r\n:2\r\n+SHORT\r\n");
    assert_eq!(out.len(), 3);
    assert!(matches!(
        out[0],
        Err(ProtocolError::TooLarge { kind: "line", len: 11, max: 8 })
    ));
    assert_eq!(out[1], Ok(Reply::Integer(2)));
    assert_eq!(out[2], Ok(Reply::status("SHORT")));
}

#[test]
fn test_unterminated_line_is_not_buffered_without_bound() {
    let limits = DecoderLimits {
        max_line_len: 8,
        ..DecoderLimits::default()
    };
    let mut decoder = ReplyDecoder::with_limits(limits);

    let out = decode_all(&mut decoder, b"+0123456789ABCDEF");
    assert_eq!(out.len(), 1);
    assert!(matches!(out[0], Err(ProtocolError::TooLarge { kind: "line", .. })));
    assert_eq!(decoder.buffered(), 0);

    // The rest of the line keeps being dropped as it arrives
    for _ in 0..100 {
        assert!(decode_all(&mut decoder, b"GHIJKLMNOPQRSTUV").is_empty());
        assert!(decoder.buffered() <= 1);
    }
    assert!(!decoder.is_idle());

    let out = decode_all(&mut decoder, b"tail\r");
    assert!(out.is_empty());
    assert_eq!(decoder.buffered(), 1);
    assert_eq!(decode_all(&mut decoder, b"\n:1\r\n"), vec![Ok(Reply::Integer(1))]);
    assert!(decoder.is_idle());
}

#[test]
fn test_overlong_line_inside_array_poisons_it() {
    let limits = DecoderLimits {
        max_line_len: 8,
        ..DecoderLimits::default()
    };
    let mut decoder = ReplyDecoder::with_limits(limits);
    let out = decode_all(&mut decoder, b"*2\r\n:1\r\n-ERR far too long\r\n+NEXT\r\n");
    assert_eq!(out.len(), 2);
    assert!(matches!(out[0], Err(ProtocolError::TooLarge { kind: "line", .. })));
    assert_eq!(out[1], Ok(Reply::status("NEXT")));
}

// =============================================================================
// Incremental Feed Tests
// =============================================================================

#[test]
fn test_every_split_point_yields_same_replies() {
    let expected = mixed_expected();
    for split in 0..=MIXED_STREAM.len() {
        let mut decoder = ReplyDecoder::new();
        let mut out = decode_all(&mut decoder, &MIXED_STREAM[..split]);
        out.extend(decode_all(&mut decoder, &MIXED_STREAM[split..]));
        assert_eq!(out, expected, "split at {}", split);
        assert!(decoder.is_idle());
    }
}

#[test]
fn test_byte_at_a_time() {
    let mut decoder = ReplyDecoder::new();
    let mut out = Vec::new();
    for byte in MIXED_STREAM {
        out.extend(decode_all(&mut decoder, std::slice::from_ref(byte)));
    }
    assert_eq!(out, mixed_expected());
}

#[test]
fn test_partial_reply_yields_nothing() {
    let mut decoder = ReplyDecoder::new();
    assert!(decode_all(&mut decoder, b"*2\r\n$3\r\nfoo\r\n").is_empty());
    assert!(!decoder.is_idle());
    assert_eq!(
        decode_all(&mut decoder, b":7\r\n"),
        vec![Ok(Reply::Array(Some(vec![Reply::bulk("foo"), Reply::Integer(7)])))]
    );
}

#[test]
fn test_deep_nesting() {
    let depth = 5_000;
    let mut stream = Vec::new();
    for _ in 0..depth {
        stream.extend_from_slice(b"*1\r\n");
    }
    stream.extend_from_slice(b":1\r\n");

    let mut out = decode_fresh(&stream);
    assert_eq!(out.len(), 1);

    let mut reply = out.pop().unwrap().unwrap();
    let mut levels = 0;
    while let Reply::Array(Some(mut items)) = reply {
        levels += 1;
        reply = items.pop().unwrap();
    }
    assert_eq!(levels, depth);
    assert_eq!(reply, Reply::Integer(1));
}

#[test]
fn test_buffered_tracks_unconsumed_bytes() {
    let mut decoder = ReplyDecoder::new();
    decoder.feed(b"+OK\r\n+PAR");
    assert_eq!(decoder.next_reply(), Some(Ok(Reply::status("OK"))));
    assert_eq!(decoder.next_reply(), None);
    assert_eq!(decoder.buffered(), 4);
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_ping_get_lrange_scenario() {
    let mut decoder = ReplyDecoder::new();
    let mut out = decode_all(&mut decoder, b"+PONG\r\n$3\r\nbar\r\n*2\r\n$3\r\nb");
    out.extend(decode_all(&mut decoder, b"ar\r\n$6\r\nlolwut\r\n"));

    assert_eq!(
        out,
        vec![
            Ok(Reply::status("PONG")),
            Ok(Reply::bulk("bar")),
            Ok(Reply::Array(Some(vec![Reply::bulk("bar"), Reply::bulk("lolwut")]))),
        ]
    );
}
