//! Six-cell one-time code entry

/// Number of digits in a verification code
pub const CODE_LENGTH: usize = 6;

/// True when `code` is exactly six ASCII digits
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Entry state of the six code cells and the focused cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInput {
    cells: [Option<char>; CODE_LENGTH],
    focus: usize,
}

impl CodeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type a character into cell `index`.
    ///
    /// Non-digits are rejected and leave every cell untouched. A digit in
    /// any cell but the last moves focus to the next one.
    pub fn enter(&mut self, index: usize, ch: char) -> bool {
        if index >= CODE_LENGTH || !ch.is_ascii_digit() {
            return false;
        }
        self.cells[index] = Some(ch);
        self.focus = if index + 1 < CODE_LENGTH { index + 1 } else { index };
        true
    }

    /// Empty cell `index` without moving focus
    pub fn clear_cell(&mut self, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = None;
            self.focus = index;
        }
    }

    /// Backspace in cell `index`: clears a filled cell, or moves focus back
    /// from an empty one
    pub fn backspace(&mut self, index: usize) {
        if index >= CODE_LENGTH {
            return;
        }
        if self.cells[index].is_some() {
            self.cells[index] = None;
            self.focus = index;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Paste a whole code. Only exactly six digits are accepted; anything
    /// else is ignored.
    pub fn paste(&mut self, text: &str) -> bool {
        if !is_valid_code(text) {
            return false;
        }
        for (cell, ch) in self.cells.iter_mut().zip(text.chars()) {
            *cell = Some(ch);
        }
        self.focus = CODE_LENGTH - 1;
        true
    }

    /// Type characters one after another starting at the focused cell
    pub fn type_digits(&mut self, text: &str) {
        for ch in text.chars() {
            let index = self.focus;
            // Full: further input is dropped
            if index == CODE_LENGTH - 1 && self.cells[index].is_some() {
                break;
            }
            self.enter(index, ch);
        }
    }

    /// Concatenation of the filled cells
    pub fn code(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    /// The code, once all six cells are filled
    pub fn complete_code(&self) -> Option<String> {
        self.is_complete().then(|| self.code())
    }

    /// Submit is only possible with all cells filled
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn cell(&self, index: usize) -> Option<char> {
        self.cells.get(index).copied().flatten()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
