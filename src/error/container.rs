//! Generic containers for attaching bytecode locations to errors and for
//! aggregating the errors of many branches.

use std::fmt::Formatter;

use thiserror::Error;

/// An error tied to the program counter, and optionally the branch, where it
/// occurred.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E>
where
    E: Clone,
{
    /// The program counter in the current method's bytecode.
    pub location: u32,

    /// The identifier of the state the error occurred on, once known.
    pub branch: Option<String>,

    /// The error data
    pub payload: E,
}

impl<E> Located<E>
where
    E: Clone,
{
    /// Records the identifier of the state (branch) on which the error
    /// occurred.
    #[must_use]
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Replaces the payload while keeping the location data.
    pub fn map<F, T>(self, op: F) -> Located<T>
    where
        F: FnOnce(E) -> T,
        T: Clone,
    {
        Located {
            location: self.location,
            branch:   self.branch,
            payload:  op(self.payload),
        }
    }
}

/// Displays the error with its branch and the little-endian hex encoding of
/// the program counter.
impl<E> std::fmt::Display for Located<E>
where
    E: std::fmt::Display + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let location = hex::encode(self.location.to_le_bytes());
        match &self.branch {
            Some(branch) => write!(f, "[{branch} @ 0x{location}]: {}", self.payload),
            None => write!(f, "[0x{location}]: {}", self.payload),
        }
    }
}

/// A trait for types that can have a byte-offset location attached to them.
pub trait Locatable
where
    Self: Sized,
{
    /// The return type with the attached byte-offset location.
    type Located;

    /// Attaches the program counter `program_counter` to the error.
    fn locate(self, program_counter: u32) -> Self::Located;
}

/// A blanket implementation that allows for attaching a location to any result.
impl<T, E> Locatable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Located = Result<T, Located<E>>;

    fn locate(self, program_counter: u32) -> Self::Located {
        self.map_err(|e| Located {
            location: program_counter,
            branch:   None,
            payload:  e,
        })
    }
}

/// A collection of errors, kept in insertion order unless the contained type
/// imposes its own.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Errors<E> {
    payloads: Vec<E>,
}

impl<E> Errors<E> {
    /// Creates a new container for errors.
    #[must_use]
    pub fn new() -> Self {
        let payloads = vec![];
        Self { payloads }
    }

    /// Gets the errors contained within this error.
    #[must_use]
    pub fn payloads(&self) -> &[E] {
        self.payloads.as_slice()
    }

    /// Iterates over the contained errors.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.payloads.iter()
    }

    /// Gets the length of the errors container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Checks if the errors container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Errors<E>
where
    E: std::error::Error,
{
    /// Adds the provided `error` to the container.
    pub fn add(&mut self, error: E) {
        self.payloads.push(error);
    }

    /// Adds the multiple provided errors to the container.
    pub fn add_many(&mut self, errors: impl Into<Vec<E>>) {
        self.payloads.extend(errors.into());
    }
}

/// Located errors are kept sorted by branch and then by program counter, so
/// that the container reads the same across repeated explorations.
impl<E> Errors<Located<E>>
where
    E: std::error::Error + Clone,
{
    /// Adds an error `payload` at `program_counter`.
    pub fn add_located(&mut self, program_counter: u32, payload: E) {
        let error = Located {
            location: program_counter,
            branch: None,
            payload,
        };
        self.payloads.push(error);
        self.sort();
    }

    /// Adds many errors to the container at once.
    pub fn add_many_located(&mut self, errors: impl Into<Vec<Located<E>>>) {
        self.payloads.extend(errors.into());
        self.sort();
    }

    /// Adds an already located error, keeping the container sorted.
    pub fn add_sorted(&mut self, error: Located<E>) {
        self.payloads.push(error);
        self.sort();
    }

    fn sort(&mut self) {
        self.payloads
            .sort_by(|l, r| (&l.branch, l.location).cmp(&(&r.branch, r.location)));
    }
}

/// The default errors container is one containing no errors.
impl<E> Default for Errors<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Allow conversion from any error type to a container of errors.
impl<E> From<E> for Errors<E>
where
    E: std::error::Error,
{
    fn from(value: E) -> Self {
        let mut errors = Self::default();
        errors.add(value);
        errors
    }
}

/// Allow conversion from the errors container to a vector of errors.
impl<E> From<Errors<E>> for Vec<E>
where
    E: std::error::Error,
{
    fn from(value: Errors<E>) -> Self {
        value.payloads
    }
}

/// Allow conversion from a vector of errors to the errors container.
impl<E> From<Vec<E>> for Errors<E>
where
    E: std::error::Error,
{
    fn from(value: Vec<E>) -> Self {
        Self { payloads: value }
    }
}

/// Displays the errors in the sequence in which they occur in the container.
///
/// It has a header specifying how many errors occurred, and then prints one
/// error per line after that. This means that in the case where errors did
/// occur, the output of `fmt` is multi-line.
impl<E> std::fmt::Display for Errors<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.payloads.is_empty() {
            write!(f, "Encountered no errors")?;
        } else {
            writeln!(f, "Encountered {} errors:", self.payloads.len())?;
            for error in &self.payloads {
                writeln!(f, "{error}")?;
            }
        }

        Ok(())
    }
}
