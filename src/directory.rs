//! Accounts and their folder trees
//!
//! [`AccountDirectory`] holds the accounts reported by `getAccounts` and
//! the folder maps reported by `syncFolders`. Both are replaced wholesale
//! on every reply; derived data (full display names, inbox unread counts)
//! is recomputed each time.

use crate::error::{Error, Result};
use crate::folder::{Folder, is_inbox_name};
use crate::protocol::{AccountFolders, AccountWire};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One configured mail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub email_address: String,
    pub is_default: bool,
    pub enabled: bool,
    /// Folders keyed by full name, in backend order.
    pub folders: IndexMap<String, Folder>,
    /// Unread count of the folder named `inbox` (any case), or zero.
    pub inbox_unread: u32,
}

impl Account {
    fn from_wire(wire: AccountWire) -> Self {
        Self {
            id: wire.id,
            display_name: wire.display_name,
            email_address: wire.email_address,
            is_default: wire.is_default,
            enabled: wire.enabled,
            folders: IndexMap::new(),
            inbox_unread: 0,
        }
    }

    fn placeholder(id: String, name: String) -> Self {
        Self {
            id,
            display_name: name,
            email_address: String::new(),
            is_default: false,
            enabled: true,
            folders: IndexMap::new(),
            inbox_unread: 0,
        }
    }

    #[must_use]
    pub fn folder(&self, full_name: &str) -> Option<&Folder> {
        self.folders.get(full_name)
    }

    /// The account's inbox, if it has one.
    #[must_use]
    pub fn inbox(&self) -> Option<&Folder> {
        self.folders.values().find(|f| is_inbox_name(&f.full_name))
    }

    /// Name to show for the account: its display name, else its address.
    #[must_use]
    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            &self.email_address
        } else {
            &self.display_name
        }
    }
}

/// Ordered collection of accounts and their folders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the account list, keeping known folder trees of accounts
    /// that are still present.
    pub fn set_accounts(&mut self, accounts: Vec<AccountWire>) {
        let mut previous: IndexMap<String, Account> = self
            .accounts
            .drain(..)
            .map(|a| (a.id.clone(), a))
            .collect();

        self.accounts = accounts
            .into_iter()
            .map(|wire| {
                let mut account = Account::from_wire(wire);
                if let Some(old) = previous.shift_remove(&account.id) {
                    account.folders = old.folders;
                    account.inbox_unread = old.inbox_unread;
                }
                account
            })
            .collect();
        debug!("Directory now holds {} account(s)", self.accounts.len());
    }

    /// Replace every account's folder tree and recompute derived data.
    ///
    /// Accounts not mentioned in `trees` end up with no folders; accounts
    /// only known from `trees` are added under their reported name.
    /// Every folder is applied even when a parent cycle is found: folders
    /// on a cycle keep their leaf name as full display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderCycle`] for the first cycle encountered.
    pub fn set_folders(&mut self, trees: Vec<AccountFolders>) -> Result<()> {
        for account in &mut self.accounts {
            account.folders.clear();
            account.inbox_unread = 0;
        }

        let mut first_error = None;
        for tree in trees {
            let index = match self.accounts.iter().position(|a| a.id == tree.account_id) {
                Some(index) => index,
                None => {
                    debug!("Folders for unlisted account {}", tree.account_id);
                    self.accounts.push(Account::placeholder(
                        tree.account_id.clone(),
                        tree.account_name.clone(),
                    ));
                    self.accounts.len() - 1
                }
            };

            let account = &mut self.accounts[index];
            account.folders = tree.folders;
            if let Err(e) = derive_display_names(&account.id, &mut account.folders) {
                first_error.get_or_insert(e);
            }
            account.inbox_unread = account.inbox().map_or(0, |f| f.unread_count);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Accounts with the default account first, otherwise in backend order.
    #[must_use]
    pub fn accounts_ordered_for_display(&self) -> Vec<&Account> {
        let (defaults, others): (Vec<&Account>, Vec<&Account>) =
            self.accounts.iter().partition(|a| a.is_default);
        defaults.into_iter().chain(others).collect()
    }

    #[must_use]
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// The account marked default, or the first one.
    #[must_use]
    pub fn default_account(&self) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.accounts.first())
    }

    #[must_use]
    pub fn folder(&self, account: &str, full_name: &str) -> Option<&Folder> {
        self.account(account)?.folder(full_name)
    }

    /// Full display name of a folder as last computed.
    #[must_use]
    pub fn full_display_name(&self, account: &str, full_name: &str) -> Option<&str> {
        self.folder(account, full_name).map(Folder::title)
    }

    /// Sum of all accounts' inbox unread counts.
    #[must_use]
    pub fn total_inbox_unread(&self) -> u32 {
        self.accounts.iter().map(|a| a.inbox_unread).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }
}

fn derive_display_names(account: &str, folders: &mut IndexMap<String, Folder>) -> Result<()> {
    let mut first_error = None;
    let view = &*folders;
    let names: Vec<(String, String)> = view
        .keys()
        .map(|full_name| {
            let name = full_display_name(account, view, full_name).unwrap_or_else(|e| {
                let leaf = view[full_name.as_str()].display_name.clone();
                first_error.get_or_insert(e);
                leaf
            });
            (full_name.clone(), name)
        })
        .collect();

    for (full_name, name) in names {
        if let Some(folder) = folders.get_mut(&full_name) {
            folder.full_display_name = name;
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Join display names from the root down to `full_name` with `/`.
///
/// A parent that is not in the map is treated as the root.
///
/// # Errors
///
/// Returns [`Error::FolderCycle`] if the parent chain revisits a folder,
/// and [`Error::UnknownFolder`] if `full_name` itself is not in the map.
pub fn full_display_name(
    account: &str,
    folders: &IndexMap<String, Folder>,
    full_name: &str,
) -> Result<String> {
    let mut folder = folders.get(full_name).ok_or_else(|| Error::UnknownFolder {
        account: account.to_string(),
        folder: full_name.to_string(),
    })?;

    let mut visited = HashSet::from([folder.full_name.as_str()]);
    let mut segments = vec![folder.display_name.as_str()];
    while let Some(parent) = folder.parent_full_name.as_deref() {
        if !visited.insert(parent) {
            warn!("Folder parent cycle in {} at {}", account, full_name);
            return Err(Error::FolderCycle {
                account: account.to_string(),
                folder: full_name.to_string(),
            });
        }
        let Some(next) = folders.get(parent) else {
            warn!("Folder {} names missing parent {}", full_name, parent);
            break;
        };
        segments.push(next.display_name.as_str());
        folder = next;
    }

    segments.reverse();
    Ok(segments.join("/"))
}
