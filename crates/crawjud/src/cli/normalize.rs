use crawjud_cnj::CnjNumber;

/// Show how case numbers normalize and which region they route to.
#[derive(Debug, clap::Args)]
pub struct Normalize {
    #[arg(required = true)]
    pub numbers: Vec<String>,
}

impl Normalize {
    pub fn run(self) {
        for raw in &self.numbers {
            println!("{}", describe(raw));
        }
    }
}

fn describe(raw: &str) -> String {
    match CnjNumber::parse(raw).and_then(|n| n.region().map(|region| (region, n))) {
        Ok((region, number)) => format!("{raw}\t{number}\tTRT{region}"),
        Err(e) => format!("{raw}\t-\t{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_valid_and_invalid_numbers() {
        assert_eq!(
            describe("00012345620245020001"),
            "00012345620245020001\t0001234-56.2024.5.02.0001\tTRT2"
        );
        assert!(describe("12-ABC").starts_with("12-ABC\t-\t"));
        assert!(describe("0001234-56.2024.8.26.0001").contains("branch 8"));
    }
}
