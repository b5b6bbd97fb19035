/// Ordered set of completion candidates, assembled by the host callback
/// each time the user presses Tab.
#[derive(Debug, Default)]
pub struct Completions {
    entries: Vec<String>,
}

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a candidate into the set.
    pub fn add(&mut self, candidate: &str) {
        self.entries.push(candidate.to_owned());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Inline suggestion painted to the right of the buffer: an argument
/// template and a short description, either of which may be empty.
///
/// When the buffer contains spaces the template is treated as a sequence of
/// `[...]`-delimited placeholders and the one being typed is highlighted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hint {
    pub args: String,
    pub desc: String,
}

impl Hint {
    pub fn new(args: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            desc: desc.into(),
        }
    }
}

pub type CompletionFn = Box<dyn FnMut(&str, &mut Completions)>;
pub type HintsFn = Box<dyn Fn(&str) -> Option<Hint>>;
