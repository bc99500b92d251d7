use anyhow::Result;
use readiness_core::{Instance, InstanceType};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use validation::{site_url_for, InstanceSelector};

/// Interactive selection over any line reader and prompt writer.
///
/// For each candidate the operator confirms inclusion (Unknown candidates
/// must be given a type) and, for ESS, may enter a base URL for the health
/// check. End of input accepts the default answer for every remaining prompt.
pub struct ConsoleSelector<R, W> {
    input: R,
    prompt: W,
    site_urls: BTreeMap<String, String>,
}

impl<R: BufRead, W: Write> ConsoleSelector<R, W> {
    pub fn new(input: R, prompt: W, site_urls: BTreeMap<String, String>) -> Self {
        ConsoleSelector { input, prompt, site_urls }
    }

    /// `None` at end of input.
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.prompt, "{} ", question)?;
        self.prompt.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.prompt)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_include(&mut self, inst: &Instance) -> Result<Option<InstanceType>> {
        let default_yes = inst.instance_type != InstanceType::Unknown;
        loop {
            let question = match inst.instance_type {
                InstanceType::Unknown => format!("Validate {} as [e]SS, [w]FE or [s]kip? [s]", inst.id()),
                kind => format!("Validate {} ({})? [Y/n]", inst.id(), kind),
            };
            let Some(answer) = self.ask(&question)? else {
                return Ok(default_yes.then_some(inst.instance_type));
            };
            match parse_choice(&answer, inst.instance_type) {
                Some(choice) => return Ok(choice),
                None => writeln!(self.prompt, "  please answer with one of the listed options")?,
            }
        }
    }

    fn ask_url(&mut self, inst: &Instance) -> Result<Option<String>> {
        let configured = site_url_for(inst, &self.site_urls);
        let question = match &configured {
            Some(u) => format!("ESS base URL for {} [{}]:", inst.id(), u),
            None => format!("ESS base URL for {} (blank to skip the API check):", inst.id()),
        };
        Ok(match self.ask(&question)? {
            Some(answer) if !answer.is_empty() => Some(answer),
            _ => configured,
        })
    }
}

/// `Some(None)` means skip; `None` means the answer was not understood.
pub fn parse_choice(answer: &str, kind: InstanceType) -> Option<Option<InstanceType>> {
    let a = answer.trim().to_ascii_lowercase();
    match kind {
        InstanceType::Unknown => match a.as_str() {
            "e" | "ess" => Some(Some(InstanceType::Ess)),
            "w" | "wfe" => Some(Some(InstanceType::Wfe)),
            "" | "s" | "skip" | "n" | "no" => Some(None),
            _ => None,
        },
        kind => match a.as_str() {
            "" | "y" | "yes" => Some(Some(kind)),
            "n" | "no" | "s" | "skip" => Some(None),
            _ => None,
        },
    }
}

impl<R: BufRead, W: Write> InstanceSelector for ConsoleSelector<R, W> {
    fn select(&mut self, candidates: &[Instance]) -> Result<Vec<Instance>> {
        writeln!(self.prompt, "Discovered {} candidate instance(s):", candidates.len())?;
        for (n, c) in candidates.iter().enumerate() {
            writeln!(self.prompt, "  [{}] {:<7} {}  ({})", n + 1, c.instance_type.as_str(), c.id(), c.physical_path.display())?;
        }

        let mut selected = Vec::new();
        for c in candidates {
            let Some(kind) = self.ask_include(c)? else { continue };
            let mut inst = c.clone();
            inst.instance_type = kind;
            if kind == InstanceType::Ess {
                inst.ess_site_url = self.ask_url(&inst)?;
            }
            selected.push(inst);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn candidates() -> Vec<Instance> {
        let mut ess = Instance::candidate("Default Web Site", "/ESS", "EssPool", "/srv/ess");
        ess.instance_type = InstanceType::Ess;
        let mut wfe = Instance::candidate("Default Web Site", "/WFE", "WfePool", "/srv/wfe");
        wfe.instance_type = InstanceType::Wfe;
        let other = Instance::candidate("Intranet", "/portal", "IntranetPool", "/srv/portal");
        vec![ess, wfe, other]
    }

    #[test]
    fn choices() {
        assert_eq!(parse_choice("", InstanceType::Ess), Some(Some(InstanceType::Ess)));
        assert_eq!(parse_choice("N", InstanceType::Wfe), Some(None));
        assert_eq!(parse_choice("w", InstanceType::Unknown), Some(Some(InstanceType::Wfe)));
        assert_eq!(parse_choice("", InstanceType::Unknown), Some(None));
        assert_eq!(parse_choice("maybe", InstanceType::Ess), None);
    }

    #[test]
    fn scripted_answers() {
        // ESS: yes + URL, WFE: no, Unknown: treat as ESS, keep configured URL.
        let input = Cursor::new("y\nhttps://ess.local\nn\ne\n\n");
        let mut urls = BTreeMap::new();
        urls.insert("portal".to_string(), "https://portal.local".to_string());
        let mut prompt = Vec::new();
        let picked = ConsoleSelector::new(input, &mut prompt, urls).select(&candidates()).unwrap();

        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].ess_site_url.as_deref(), Some("https://ess.local"));
        assert_eq!(picked[1].id(), "Intranet/portal");
        assert_eq!(picked[1].instance_type, InstanceType::Ess);
        assert_eq!(picked[1].ess_site_url.as_deref(), Some("https://portal.local"));
        assert!(String::from_utf8(prompt).unwrap().contains("Discovered 3 candidate instance(s)"));
    }

    #[test]
    fn invalid_answer_is_asked_again() {
        let input = Cursor::new("what\ny\n\nn\n");
        let mut prompt = Vec::new();
        let picked = ConsoleSelector::new(input, &mut prompt, BTreeMap::new()).select(&candidates()).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].ess_site_url, None);
        assert!(String::from_utf8(prompt).unwrap().contains("please answer"));
    }

    #[test]
    fn end_of_input_takes_defaults() {
        let mut prompt = Vec::new();
        let picked = ConsoleSelector::new(Cursor::new(""), &mut prompt, BTreeMap::new()).select(&candidates()).unwrap();
        let ids: Vec<String> = picked.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["Default Web Site/ESS", "Default Web Site/WFE"]);
    }
}
