use std::fmt::{Debug, Display, Formatter};

use crate::Quantity;

pub type Watts = Quantity<1, 0>;

impl Display for Watts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0} W", self.0)
    }
}

impl Debug for Watts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}W", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Watts::from(1234.4).to_string(), "1234 W");
        assert_eq!(format!("{:?}", Watts::from(-20)), "-20W");
    }
}
