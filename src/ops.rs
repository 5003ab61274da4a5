use core::str::FromStr;

use crate::Error;

/// One entry of an operation feed: an opcode and its operand.
///
/// Parses from `"<opcode> <value>"`, where the opcode is `a`/`add` or
/// `r`/`remove`, separated from the value by whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<T> {
    /// Add the value
    Add(T),
    /// Remove one occurrence of the value
    Remove(T),
}

impl<T: FromStr> FromStr for Op<T> {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let (Some(opcode), Some(operand), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(Error::MalformedOp);
        };

        let value = operand.parse().map_err(|_| Error::MalformedOp)?;
        match opcode {
            "a" | "add" => Ok(Op::Add(value)),
            "r" | "remove" => Ok(Op::Remove(value)),
            _ => Err(Error::MalformedOp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_parse_short_and_long_opcodes() {
        assert_eq!("a 5".parse::<Op<f64>>(), Ok(Op::Add(5.0)));
        assert_eq!("r -3".parse::<Op<f64>>(), Ok(Op::Remove(-3.0)));
        assert_eq!("add 2.5".parse::<Op<f64>>(), Ok(Op::Add(2.5)));
        assert_eq!("  remove\t7 ".parse::<Op<i64>>(), Ok(Op::Remove(7)));
    }

    #[test]
    fn test_op_parse_rejects_malformed_lines() {
        for line in ["", "a", "5", "x 5", "a five", "a 5 6", "A 5"] {
            assert_eq!(line.parse::<Op<f64>>(), Err(Error::MalformedOp), "{line:?}");
        }
    }
}
