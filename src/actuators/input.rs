use anyhow::{Context, Result, anyhow, bail};
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Settings};
use tracing::trace;

use super::{InputActuator, ScrollDirection};

/// Real pointer/keyboard injection through Enigo.
/// The Enigo connection is opened on first use.
#[derive(Default)]
pub struct EnigoInput {
    enigo: Option<Enigo>,
}

impl EnigoInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "atlas::actuators", "Initializing Enigo");
            let enigo = Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?;
            self.enigo = Some(enigo);
        }
        self.enigo
            .as_mut()
            .ok_or_else(|| anyhow!("Enigo is not available"))
    }

    fn click_button(&mut self, x: i32, y: i32, button: Button, count: u8) -> Result<()> {
        let enigo = self.ensure_enigo()?;
        trace!(target: "atlas::actuators", x, y, ?button, count, "mouse_click");
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .with_context(|| format!("Failed to move pointer to ({x}, {y})"))?;
        for _ in 0..count {
            enigo.button(button, Direction::Click)?;
        }
        Ok(())
    }
}

impl InputActuator for EnigoInput {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Left, 1)
    }

    fn double_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Left, 2)
    }

    fn right_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Right, 1)
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        let enigo = self.ensure_enigo()?;
        trace!(target: "atlas::actuators", %text, "type_text");
        enigo.text(text).context("Failed to type text")?;
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        let mapped = map_key(key)?;
        let enigo = self.ensure_enigo()?;
        trace!(target: "atlas::actuators", %key, "press_key");
        enigo
            .key(mapped, Direction::Click)
            .with_context(|| format!("Failed to press '{key}'"))?;
        Ok(())
    }

    fn press_combo(&mut self, keys: &[&str]) -> Result<()> {
        let Some((last, modifiers)) = keys.split_last() else {
            bail!("Empty key combination");
        };
        let modifiers = modifiers
            .iter()
            .map(|k| map_key(k))
            .collect::<Result<Vec<_>>>()?;
        let last = map_key(last)?;
        let enigo = self.ensure_enigo()?;
        trace!(target: "atlas::actuators", ?keys, "press_combo");

        for key in &modifiers {
            enigo.key(*key, Direction::Press)?;
        }
        let tapped = enigo.key(last, Direction::Click);
        // Release even if the tap failed so no modifier stays held.
        for key in modifiers.iter().rev() {
            enigo.key(*key, Direction::Release)?;
        }
        tapped.with_context(|| format!("Failed to press combination {}", keys.join("+")))?;
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<()> {
        let enigo = self.ensure_enigo()?;
        trace!(target: "atlas::actuators", %direction, amount, "scroll");
        // Enigo: positive vertical is down, positive horizontal is right.
        let (length, axis) = match direction {
            ScrollDirection::Up => (-amount, Axis::Vertical),
            ScrollDirection::Down => (amount, Axis::Vertical),
            ScrollDirection::Left => (-amount, Axis::Horizontal),
            ScrollDirection::Right => (amount, Axis::Horizontal),
        };
        enigo.scroll(length, axis).context("Failed to scroll")?;
        Ok(())
    }
}

/// Map a script key name to an Enigo key. Single characters map to themselves.
pub fn map_key(name: &str) -> Result<Key> {
    let lower = name.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "esc" | "escape" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "capslock" => Key::CapsLock,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "cmd" | "command" | "meta" | "win" | "super" => Key::Meta,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => {
            let mut chars = name.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => bail!("Unknown key '{name}'"),
            }
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_are_case_insensitive() {
        assert_eq!(map_key("Enter").unwrap(), Key::Return);
        assert_eq!(map_key("CMD").unwrap(), Key::Meta);
        assert_eq!(map_key("f5").unwrap(), Key::F5);
    }

    #[test]
    fn single_characters_keep_their_case() {
        assert_eq!(map_key("+").unwrap(), Key::Unicode('+'));
        assert_eq!(map_key("A").unwrap(), Key::Unicode('A'));
        assert_eq!(map_key("5").unwrap(), Key::Unicode('5'));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(map_key("hyper").is_err());
        assert!(map_key("").is_err());
    }
}
