//! Amounts in words for bill PDFs, Indian numbering: Crore, Lakh, Thousand,
//! Hundred, with paise spelled out after the rupees.

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "Ten", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn two_digits(n: u64) -> String {
    debug_assert!(n < 100);
    if n < 20 {
        ONES[n as usize].to_string()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_string()
    } else {
        format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize])
    }
}

fn rupees_in_words(n: u64) -> String {
    if n == 0 {
        return "Zero".to_string();
    }

    let crore = n / 10_000_000;
    let lakh = (n / 100_000) % 100;
    let thousand = (n / 1_000) % 100;
    let hundred = (n / 100) % 10;
    let rest = n % 100;

    let mut parts: Vec<String> = Vec::new();
    if crore > 0 {
        // Recurses so amounts past 99 crore still spell out.
        parts.push(format!("{} Crore", rupees_in_words(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", two_digits(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", two_digits(thousand)));
    }
    if hundred > 0 {
        parts.push(format!("{} Hundred", ONES[hundred as usize]));
    }
    if rest > 0 {
        if parts.is_empty() {
            parts.push(two_digits(rest));
        } else {
            parts.push(format!("and {}", two_digits(rest)));
        }
    }

    parts.join(" ")
}

/// "12345.67" becomes "Twelve Thousand Three Hundred and Forty Five and
/// Sixty Seven Paise". Negative amounts are prefixed with "Minus".
pub fn amount_in_words(amount: f64) -> String {
    let negative = amount < 0.0;
    let amount = amount.abs();

    let mut rupees = amount.trunc() as u64;
    let mut paise = ((amount - amount.trunc()) * 100.0).round() as u64;
    if paise >= 100 {
        rupees += 1;
        paise = 0;
    }

    let mut words = rupees_in_words(rupees);
    if paise > 0 {
        words = format!("{} and {} Paise", words, two_digits(paise));
    }
    if negative {
        words = format!("Minus {}", words);
    }
    words
}
