use crate::api::types::Company;

/// The company list as last fetched, plus local edits
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyList {
  items: Vec<Company>,
  selected: Option<String>,
  loading: bool,
}

impl CompanyList {
  pub fn items(&self) -> &[Company] {
    &self.items
  }

  /// Replace the list wholesale (after a fetch)
  pub fn set(&mut self, items: Vec<Company>) {
    self.items = items;
    self.loading = false;
    if let Some(id) = &self.selected {
      if !self.items.iter().any(|c| &c.id == id) {
        self.selected = None;
      }
    }
  }

  pub fn add(&mut self, company: Company) {
    self.items.push(company);
  }

  /// Drop the company with this id. Returns whether anything was removed.
  pub fn remove(&mut self, id: &str) -> bool {
    let before = self.items.len();
    self.items.retain(|c| c.id != id);
    if self.selected.as_deref() == Some(id) {
      self.selected = None;
    }
    self.items.len() != before
  }

  pub fn select(&mut self, id: Option<String>) {
    self.selected = id;
  }

  pub fn selected(&self) -> Option<&Company> {
    let id = self.selected.as_deref()?;
    self.items.iter().find(|c| c.id == id)
  }

  pub fn set_loading(&mut self, loading: bool) {
    self.loading = loading;
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }
}

/// Case-insensitive substring match over name and url.
pub fn company_matches(company: &Company, query: &str) -> bool {
  let query = query.trim().to_lowercase();
  if query.is_empty() {
    return true;
  }
  company.name.to_lowercase().contains(&query) || company.url.to_lowercase().contains(&query)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::CompanyStatus;
  use pretty_assertions::assert_eq;

  fn company(id: &str, name: &str, url: &str) -> Company {
    Company {
      id: id.to_string(),
      name: name.to_string(),
      url: url.to_string(),
      industry: None,
      notes: None,
      status: CompanyStatus::Active,
      last_scanned: None,
      next_scan: None,
      created_at: None,
    }
  }

  #[test]
  fn test_remove_drops_only_that_id() {
    let mut list = CompanyList::default();
    list.set(vec![
      company("1", "Acme", "acme.com"),
      company("2", "Globex", "globex.com"),
    ]);

    assert!(list.remove("1"));
    assert!(!list.remove("1"));
    assert_eq!(list.items(), &[company("2", "Globex", "globex.com")]);
  }

  #[test]
  fn test_add_appends() {
    let mut list = CompanyList::default();
    list.add(company("1", "Acme", "acme.com"));
    list.add(company("2", "Globex", "globex.com"));
    let ids: Vec<_> = list.items().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
  }

  #[test]
  fn test_selection_cleared_when_company_disappears() {
    let mut list = CompanyList::default();
    list.set(vec![company("1", "Acme", "acme.com")]);
    list.select(Some("1".into()));
    assert_eq!(list.selected().map(|c| c.name.as_str()), Some("Acme"));

    list.set(vec![company("2", "Globex", "globex.com")]);
    assert!(list.selected().is_none());
  }

  #[test]
  fn test_set_clears_loading() {
    let mut list = CompanyList::default();
    list.set_loading(true);
    list.set(Vec::new());
    assert!(!list.is_loading());
  }

  #[test]
  fn test_company_matches() {
    let acme = company("1", "Acme Corp", "https://acme.com/");
    assert!(company_matches(&acme, ""));
    assert!(company_matches(&acme, "acme"));
    assert!(company_matches(&acme, "ACME.COM"));
    assert!(company_matches(&acme, " corp "));
    assert!(!company_matches(&acme, "globex"));
  }
}
