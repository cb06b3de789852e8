/// Inclusive bounds a number entity accepts on its set path, ordered on construction.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Range<T> {
    min: T,
    max: T,
}

impl<T: PartialOrd> Range<T> {
    pub fn new(min: T, max: T) -> Self {
        if min > max {
            return Self { min: max, max: min };
        }

        Self { min, max }
    }

    pub fn min(&self) -> &T {
        &self.min
    }

    pub fn max(&self) -> &T {
        &self.max
    }

    /// Inclusive on both ends. Values that do not compare (NaN) are never contained.
    pub fn contains(&self, value: &T) -> bool {
        value >= &self.min && value <= &self.max
    }
}

impl<T: PartialEq> PartialEq for Range<T> {
    fn eq(&self, other: &Self) -> bool {
        self.min == other.min && self.max == other.max
    }
}

impl<T> std::fmt::Display for Range<T>
where
    T: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
