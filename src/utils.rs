use std::fmt::Display;

const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

fn to_unicode(number: isize, digits: &[char; 10], minus_sign: char) -> String {
    if number == 0 {
        return digits[0].to_string();
    }
    let mut num = number;
    let mut digit_stack = Vec::new();
    while num != 0 {
        let digit = (num % 10).unsigned_abs();
        digit_stack.push(digits[digit]);
        num /= 10;
    }
    let mut result = String::new();
    if number < 0 {
        result.push(minus_sign);
    }
    result.extend(digit_stack.drain(..).rev());
    result
}

pub fn to_subscript(number: isize) -> String {
    to_unicode(number, &SUBSCRIPT_DIGITS, '₋')
}

/// Joins the display forms of `items` with `sep`.
pub fn join_display<T: Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts() {
        assert_eq!(to_subscript(0), "₀");
        assert_eq!(to_subscript(12), "₁₂");
        assert_eq!(to_subscript(-3), "₋₃");
    }

    #[test]
    fn join() {
        assert_eq!(join_display(&[1, 2, 3], ", "), "1, 2, 3");
        assert_eq!(join_display::<usize>(&[], " "), "");
    }
}
