//! Built-in QWERTY layout and synthetic swipe paths.
//!
//! Used by the simulator binary and the benchmarks, which have no host
//! keyboard to take a layout from.

use glide_core::config::KeyboardConfig;
use glide_core::types::{key_codes, Key, KeyboardDescriptor, Point};

const LETTER_ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];

/// A four-row QWERTY keyboard sized after `config`.
///
/// Three letter rows are followed by a bottom row with the symbols switch,
/// space and enter. Shift and delete flank the last letter row.
pub fn qwerty(config: &KeyboardConfig) -> KeyboardDescriptor {
    let key_width = (config.width / 10).max(1) as i32;
    let key_height = (config.height / 4).max(1) as i32;
    let mut keys = Vec::with_capacity(34);

    for (row, letters) in LETTER_ROWS.iter().enumerate() {
        let y = row as i32 * key_height;
        let offset = match row {
            0 => 0,
            1 => key_width / 2,
            _ => key_width * 3 / 2,
        };
        for (col, ch) in letters.chars().enumerate() {
            keys.push(Key::letter(
                ch,
                offset + col as i32 * key_width,
                y,
                key_width,
                key_height,
            ));
        }
    }

    let third_row = 2 * key_height;
    let wide = key_width * 3 / 2;
    keys.push(Key::functional(key_codes::SHIFT, 0, third_row, wide, key_height));
    keys.push(Key::functional(
        key_codes::DELETE,
        key_width * 17 / 2,
        third_row,
        wide,
        key_height,
    ));

    let bottom = 3 * key_height;
    keys.push(Key::functional(key_codes::MODE_SYMBOLS, 0, bottom, wide, key_height));
    keys.push(Key::letter(' ', wide, bottom, key_width * 7, key_height));
    keys.push(Key::letter('\n', wide + key_width * 7, bottom, wide, key_height));

    let locale = if config.locale.is_empty() {
        None
    } else {
        Some(config.locale.clone())
    };

    KeyboardDescriptor {
        layout_id: config.layout_id.clone(),
        min_width: config.width,
        height: config.height,
        locale,
        keys,
    }
}

/// The key containing `(x, y)`, if any.
pub fn key_at(keyboard: &KeyboardDescriptor, x: i32, y: i32) -> Option<&Key> {
    keyboard
        .keys
        .iter()
        .find(|k| x >= k.x && x < k.x + k.width && y >= k.y && y < k.y + k.height)
}

/// A finger path dragging through the keys of `word`.
///
/// Each hop between consecutive key centers is split into `steps` points.
/// Returns `None` when a character has no key on the layout.
pub fn swipe_path(keyboard: &KeyboardDescriptor, word: &str, steps: usize) -> Option<Vec<(i32, i32)>> {
    let centers: Vec<Point> = word
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| {
            keyboard
                .keys
                .iter()
                .find(|k| k.character() == Some(ch))
                .map(Key::center)
        })
        .collect::<Option<_>>()?;

    let first = *centers.first()?;
    let steps = steps.max(1);
    let mut path = vec![(first.x as i32, first.y as i32)];
    for hop in centers.windows(2) {
        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            path.push((
                (hop[0].x + t * (hop[1].x - hop[0].x)) as i32,
                (hop[0].y + t * (hop[1].y - hop[0].y)) as i32,
            ));
        }
    }
    Some(path)
}
