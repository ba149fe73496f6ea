//! RESP command serializer.
//!
//! Encodes command arguments into the RESP bulk string array wire format:
//! `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`

use itoa::Buffer;

/// Upper bound on the encoded size of one command, used to pre-size buffers.
fn encoded_len<A: AsRef<[u8]>>(args: &[A]) -> usize {
    // '*' + digits + \r\n, then '$' + digits + \r\n + data + \r\n per arg
    let mut cap = 1 + 20 + 2;
    for arg in args {
        cap += 1 + 20 + 2 + arg.as_ref().len() + 2;
    }
    cap
}

/// Append one encoded command to `buf`.
pub fn encode_into<A: AsRef<[u8]>>(buf: &mut Vec<u8>, args: &[A]) {
    let mut itoa_buf = Buffer::new();

    buf.push(b'*');
    buf.extend_from_slice(itoa_buf.format(args.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for arg in args {
        let arg = arg.as_ref();
        buf.push(b'$');
        buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}

/// Encode a command (list of arguments) into RESP wire format.
///
/// Each argument is treated as a binary-safe bulk string.
///
/// # Example
/// ```
/// let bytes = redline::resp::encode_command(&["SET", "key", "value"]);
/// assert_eq!(bytes, b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
/// ```
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(args));
    encode_into(&mut buf, args);
    buf
}

/// Encode multiple commands into a single buffer for pipelined writes.
///
/// Everything is concatenated into one contiguous `Vec<u8>` that can be
/// sent with a single `write_all`.
pub fn encode_pipeline<'a, I, A>(commands: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [A]>,
    A: AsRef<[u8]> + 'a,
{
    let commands: Vec<&[A]> = commands.into_iter().collect();
    let cap = commands.iter().map(|args| encoded_len(*args)).sum();
    let mut buf = Vec::with_capacity(cap);
    for args in commands {
        encode_into(&mut buf, args);
    }
    buf
}

// ── Tests ──────────────────────────────────────────────────────────
