use std::fmt::{Debug, Display, Formatter};

use crate::Quantity;

pub type Percent = Quantity<0, 1>;

impl Display for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} %", self.0)
    }
}

impl Debug for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Percent::from(80).to_string(), "80 %");
        assert_eq!(format!("{:?}", Percent::from(62.5)), "62.5%");
    }
}
