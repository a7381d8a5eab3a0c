use std::path::Path;

use lumen_chunker::{parse, parse_file, SkipReason};

const SERVICE_TS: &str = r#"import { request } from './http';
import type { User } from './types';

/** Maximum users fetched at once. */
export const PAGE_SIZE = 50;

export interface UserQuery {
  name?: string;
  page: number;
}

// Fetch one page of users.
export async function fetchUsers(query: UserQuery): Promise<User[]> {
  const response = await request('/users', { params: query });
  return response.data;
}

export class UserCache {
  private entries = new Map<string, User>();

  /** Look up a cached user. */
  lookup(identifier: string): User | undefined {
    return this.entries.get(identifier);
  }

  remember = (user: User) => {
    this.entries.set(user.identifier, user);
  };
}

registerService('users', fetchUsers);
"#;

#[test]
fn handwritten_service_is_chunked() {
    let record = parse(SERVICE_TS, "typescript").unwrap();
    assert_eq!(record.imports.lines().count(), 2);
    assert_eq!(record.fields.len(), 2);
    assert_eq!(record.functions.len(), 1);
    assert_eq!(record.classes.len(), 1);
    assert_eq!(record.expressions.len(), 1);

    let fetch = &record.functions[0];
    assert_eq!(fetch.name.as_deref(), Some("fetchUsers"));
    assert_eq!(fetch.comment.as_deref(), Some("// Fetch one page of users."));
    assert_eq!(fetch.return_type.as_deref(), Some("Promise<User[]>"));
    assert_eq!(
        &SERVICE_TS[fetch.start_index..fetch.end_index],
        format!("// Fetch one page of users.\n{}", fetch.code)
    );

    let cache = &record.classes[0];
    assert_eq!(cache.fields.len(), 1);
    assert_eq!(cache.methods.len(), 2);
    assert_eq!(cache.methods[0].comment.as_deref(), Some("/** Look up a cached user. */"));

    let named: Vec<_> = record
        .named_blocks()
        .filter_map(|b| b.name.as_deref())
        .collect();
    assert!(named.contains(&"UserCache"));
    assert!(named.contains(&"lookup"));
    assert!(named.contains(&"PAGE_SIZE"));
}

#[test]
fn spans_slice_back_to_block_text() {
    let record = parse(SERVICE_TS, "typescript").unwrap();
    for block in record.function_blocks() {
        let slice = &SERVICE_TS[block.start_index..block.end_index];
        assert!(slice.ends_with(&block.code), "span of {:?}", block.name);
        if let Some(comment) = &block.comment {
            assert!(slice.starts_with(comment.lines().next().unwrap()));
        }
    }
}

#[test]
fn bundled_file_on_disk_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = format!("{SERVICE_TS}\n//# sourceMappingURL=service.8d1c.js.map\n");
    std::fs::write(dir.path().join("service.js"), bundle).unwrap();
    assert_eq!(
        parse_file(dir.path(), Path::new("service.js")),
        Err(SkipReason::Bundle)
    );
}

#[test]
fn unsupported_extension_is_skipped_without_reading() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        parse_file(dir.path(), Path::new("styles.css")),
        Err(SkipReason::Unsupported(_))
    ));
}
