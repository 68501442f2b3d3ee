//! Memory-image text format.
//!
//! A program image is the whole 65536-word address space written out as
//! base-16 words separated by whitespace. The emitter groups sixteen words
//! per line, but the parser only cares about the token stream, so hand-cut
//! fragments with any spacing load the same way. An image with a malformed
//! word or the wrong word count is rejected as a whole.

use crate::memory::RAM_WORDS;

/// Parse an image from its text form. The result is exactly one full
/// address space; anything else is an error naming the offending token or
/// the actual word count.
pub fn parse_image(text: &str) -> Result<Box<[u16; RAM_WORDS]>, String> {
    let mut image = vec![0u16; RAM_WORDS].into_boxed_slice();
    let mut count = 0usize;
    for token in text.split_whitespace() {
        let value = u16::from_str_radix(token, 16)
            .map_err(|_| format!("invalid word in image: {:?}", token))?;
        if count < RAM_WORDS {
            image[count] = value;
        }
        count += 1;
    }
    if count != RAM_WORDS {
        return Err(format!(
            "image has {} words, expected {}",
            count, RAM_WORDS
        ));
    }
    // Length was checked above, so the conversion cannot fail.
    image
        .try_into()
        .map_err(|_| "image buffer length mismatch".to_string())
}

/// Render an image in the canonical text form: sixteen lowercase
/// four-digit words per line.
pub fn format_image(words: &[u16; RAM_WORDS]) -> String {
    let mut out = String::with_capacity(RAM_WORDS * 5);
    for (i, word) in words.iter().enumerate() {
        out.push_str(&format!("{:04x}", word));
        out.push(if i % 16 == 15 { '\n' } else { ' ' });
    }
    out
}
