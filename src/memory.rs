use std::collections::HashMap;

use crate::value::{FromValue, Value};

/// One lexical scope: names to values.
pub type Frame = HashMap<String, Value>;

/// Stack of scope frames. The bottom frame holds globals; the top frame is
/// the active scope.
///
/// # Example
///
/// ```
/// use tillscript::{Memory, Value};
///
/// let mut memory = Memory::new();
/// memory.set("total", Value::Integer(1));
/// memory.push();
/// memory.set("total", Value::Integer(2)); // updates the outer binding
/// memory.set("line", Value::Integer(3));  // created in the inner frame
/// memory.pop();
/// assert_eq!(memory.get_as::<i64>("total"), Some(2));
/// assert!(!memory.contains("line"));
/// ```
#[derive(Debug, Clone)]
pub struct Memory {
    frames: Vec<Frame>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            frames: vec![Frame::new()],
        }
    }

    /// Memory whose global frame starts as a copy of `globals`.
    pub fn with_globals(globals: Frame) -> Self {
        Memory {
            frames: vec![globals],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pop the active frame. The global frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look a name up, innermost frame first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }

    /// Typed retrieval with coercion; `None` when the name is unbound or the
    /// value does not convert.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign to the nearest frame that binds `name`, or create it in the
    /// innermost frame.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.declare(name, value),
        }
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.frames[0].insert(name.to_string(), value);
    }

    pub fn globals(&self) -> &Frame {
        &self.frames[0]
    }

    /// Bindings visible above the global frame, inner frames shadowing outer
    /// ones. This is what a lambda captures.
    pub fn capture(&self) -> Frame {
        let mut visible = Frame::new();
        for frame in self.frames.iter().skip(1) {
            for (name, value) in frame {
                visible.insert(name.clone(), value.clone());
            }
        }
        visible
    }

    /// Detach every frame above the globals, leaving a stack where only the
    /// global scope is visible. Pair with [`Memory::restore`].
    pub fn isolate(&mut self) -> Vec<Frame> {
        self.frames.split_off(1)
    }

    /// Drop whatever frames sit above the globals and put `saved` back.
    pub fn restore(&mut self, saved: Vec<Frame>) {
        self.frames.truncate(1);
        self.frames.extend(saved);
    }
}
