//! Property tests for incremental line parsing.
//!
//! However the producer's output is chopped into appends, and however often
//! the adapter is polled in between, the collected lines must equal a single
//! parse of the whole stream.

use asel_core::{OutputBuffer, lines_from_process};
use proptest::prelude::*;

fn reference_lines(stream: &[u8]) -> Vec<String> {
    stream
        .split(|&b| b == b'\n')
        .map(|raw| raw.strip_suffix(b"\r").unwrap_or(raw))
        .filter(|raw| !raw.is_empty())
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect()
}

fn stream_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::sample::select(b"abcxyz ".to_vec()),
            2 => Just(b'\n'),
            1 => Just(b'\r'),
        ],
        0..200,
    )
}

proptest! {
    #[test]
    fn chunked_parse_equals_whole_parse(
        stream in stream_strategy(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
        poll_mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        let mut offsets: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
        offsets.push(0);
        offsets.push(stream.len());
        offsets.sort_unstable();
        offsets.dedup();

        let buffer = OutputBuffer::new();
        let mut source = lines_from_process("gen", Vec::<String>::new());
        for (n, window) in offsets.windows(2).enumerate() {
            buffer.append(&stream[window[0]..window[1]]);
            if poll_mask.get(n).copied().unwrap_or(true) {
                source.poll(&buffer);
                prop_assert!(source.cursor() <= buffer.len());
            }
        }
        buffer.finish();
        source.poll(&buffer);

        let expected = reference_lines(&stream);
        prop_assert_eq!(source.lines(), expected.as_slice());
        prop_assert_eq!(source.cursor(), buffer.len());
    }

    #[test]
    fn repolling_is_idempotent(stream in stream_strategy()) {
        let buffer = OutputBuffer::new();
        let mut source = lines_from_process("gen", Vec::<String>::new());
        buffer.append(&stream);
        source.poll(&buffer);
        let first = source.lines().to_vec();
        let cursor = source.cursor();
        prop_assert_eq!(source.poll(&buffer), 0);
        prop_assert_eq!(source.lines(), first.as_slice());
        prop_assert_eq!(source.cursor(), cursor);
    }

    #[test]
    fn lines_before_eof_are_always_terminated(stream in stream_strategy()) {
        let buffer = OutputBuffer::new();
        let mut source = lines_from_process("gen", Vec::<String>::new());
        buffer.append(&stream);
        source.poll(&buffer);
        let terminated = match stream.iter().rposition(|&b| b == b'\n') {
            Some(i) => &stream[..=i],
            None => &stream[..0],
        };
        let expected = reference_lines(terminated);
        prop_assert_eq!(source.lines(), expected.as_slice());
    }
}

#[test]
fn two_increments_then_idle_poll() {
    let buffer = OutputBuffer::new();
    let mut source = lines_from_process("printf", Vec::<String>::new());
    buffer.append(b"a\nb\n");
    source.poll(&buffer);
    buffer.append(b"c\n");
    source.poll(&buffer);
    assert_eq!(source.lines(), ["a", "b", "c"]);
    source.poll(&buffer);
    assert_eq!(source.lines(), ["a", "b", "c"]);
}
