//! Framer Tests
//!
//! Tests for chunk header decoding and chunked writing.

use bytes::{Bytes, BytesMut};
use boltlink::chunking::{write_message, ChunkDecoder, ChunkedWriter, MAX_CHUNK_SIZE, MAX_FRAME_LENGTH};

fn drain(decoder: &mut ChunkDecoder) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    while let Some(chunk) = decoder.next_chunk().unwrap() {
        chunks.push(chunk);
    }
    chunks
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_single_chunk_and_terminator() {
    let mut decoder = ChunkDecoder::default();
    decoder.extend(&[0x00, 0x03, b'a', b'b', b'c', 0x00, 0x00]);

    let chunks = drain(&mut decoder);
    assert_eq!(chunks.len(), 2);
    assert_eq!(&chunks[0][..], b"abc");
    assert!(chunks[1].is_empty());
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn test_zero_length_chunks_are_emitted() {
    let mut decoder = ChunkDecoder::default();
    decoder.extend(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let chunks = drain(&mut decoder);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.is_empty()));
}

#[test]
fn test_partial_header_and_body_wait_for_more() {
    let mut decoder = ChunkDecoder::default();

    decoder.extend(&[0x00]);
    assert!(decoder.next_chunk().unwrap().is_none());

    decoder.extend(&[0x04, b'w', b'x']);
    assert!(decoder.next_chunk().unwrap().is_none());
    assert_eq!(decoder.buffered(), 4);

    decoder.extend(&[b'y', b'z']);
    assert_eq!(&decoder.next_chunk().unwrap().unwrap()[..], b"wxyz");
}

#[test]
fn test_frame_limit_is_header_plus_max_chunk() {
    assert_eq!(MAX_FRAME_LENGTH, 2 + 0xFFFF);

    // A partial maximal chunk waits for more bytes instead of failing
    let mut decoder = ChunkDecoder::new();
    decoder.extend(&[0xFF, 0xFF, 1, 2, 3]);
    assert!(decoder.next_chunk().unwrap().is_none());
    assert_eq!(decoder.buffered(), 5);
}

#[test]
fn test_maximum_chunk_is_accepted() {
    let mut decoder = ChunkDecoder::default();
    let mut wire = vec![0xFF, 0xFF];
    wire.extend(std::iter::repeat(7u8).take(MAX_CHUNK_SIZE));
    decoder.extend(&wire);

    let chunk = decoder.next_chunk().unwrap().unwrap();
    assert_eq!(chunk.len(), MAX_CHUNK_SIZE);
}

// =============================================================================
// Writing Tests
// =============================================================================

#[test]
fn test_write_message_splits_at_max_chunk_size() {
    let payload: Vec<u8> = (0..10u8).collect();
    let mut out = BytesMut::new();
    write_message(&payload, 4, &mut out);

    assert_eq!(
        &out[..],
        &[
            0x00, 0x04, 0, 1, 2, 3,
            0x00, 0x04, 4, 5, 6, 7,
            0x00, 0x02, 8, 9,
            0x00, 0x00,
        ]
    );
}

#[test]
fn test_write_then_decode_recovers_chunks() {
    let payload = vec![0x5Au8; 100_000];
    let mut out = BytesMut::new();
    write_message(&payload, MAX_CHUNK_SIZE, &mut out);

    let mut decoder = ChunkDecoder::default();
    decoder.extend(&out);
    let chunks = drain(&mut decoder);

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].len(), MAX_CHUNK_SIZE);
    assert_eq!(chunks[1].len(), 100_000 - MAX_CHUNK_SIZE);
    assert!(chunks[2].is_empty());
}

#[test]
fn test_chunked_writer_writes_to_stream() {
    let mut writer = ChunkedWriter::new(Vec::new(), MAX_CHUNK_SIZE);
    writer.write(b"hi").unwrap();
    writer.write(b"").unwrap();
    writer.flush().unwrap();

    assert_eq!(writer.get_ref().as_slice(), &[0x00, 0x02, b'h', b'i', 0x00, 0x00, 0x00, 0x00]);
}
