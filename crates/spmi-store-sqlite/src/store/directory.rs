//! [`DirectoryStore`] for [`SqliteStore`].

use rusqlite::{OptionalExtension as _, params};
use spmi_core::{
  Error as CoreError,
  access::Role,
  directory::{Credentials, Department, DepartmentFilter, NewDepartment, NewUser, User},
  store::DirectoryStore,
};

use super::{SqliteStore, exists, load_department, load_roles, load_user};
use crate::Result;

fn check_owner(conn: &rusqlite::Connection, owner_user_id: Option<i64>) -> Result<()> {
  match owner_user_id {
    Some(id) if load_user(conn, id)?.is_none() => {
      Err(CoreError::field("owner_user_id", format!("user {id} does not exist")).into())
    }
    _ => Ok(()),
  }
}

impl DirectoryStore for SqliteStore {
  async fn upsert_user(&self, input: NewUser) -> Result<User> {
    let mut errors = spmi_core::ValidationErrors::new();
    errors.require_text("username", &input.username);
    errors.require_text("name", &input.name);
    if input.roles.is_empty() {
      errors.add("roles", "at least one role is required");
    }
    errors.into_result()?;

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let user_id: i64 = tx.query_row(
          "INSERT INTO users (username, name, password_hash) VALUES (?1, ?2, ?3)
           ON CONFLICT (username) DO UPDATE SET
             name          = excluded.name,
             password_hash = excluded.password_hash
           RETURNING user_id",
          params![input.username.trim(), input.name.trim(), input.password_hash],
          |row| row.get(0),
        )?;

        tx.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user_id])?;
        let mut roles: Vec<Role> = Vec::with_capacity(input.roles.len());
        for role in input.roles {
          if roles.contains(&role) {
            continue;
          }
          tx.execute(
            "INSERT INTO user_roles (user_id, role, position) VALUES (?1, ?2, ?3)",
            params![user_id, role.to_string(), roles.len() as i64],
          )?;
          roles.push(role);
        }

        let user = User {
          id: user_id,
          username: input.username.trim().to_owned(),
          name: input.name.trim().to_owned(),
          roles,
        };
        tx.commit()?;
        Ok(user)
      })
      .await
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>> {
    self.with_conn(move |conn| load_user(conn, id)).await
  }

  async fn find_credentials(&self, username: String) -> Result<Option<Credentials>> {
    self
      .with_conn(move |conn| {
        let row = conn
          .query_row(
            "SELECT user_id, username, name, password_hash FROM users WHERE username = ?1",
            params![username],
            |row| {
              Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
              ))
            },
          )
          .optional()?;

        let Some((id, username, name, password_hash)) = row else {
          return Ok(None);
        };
        let roles = load_roles(conn, id)?;
        Ok(Some(Credentials {
          user: User { id, username, name, roles },
          password_hash,
        }))
      })
      .await
  }

  async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
    let role = role.map(|r| r.to_string());
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.username, u.name FROM users u
           WHERE ?1 IS NULL
              OR EXISTS (SELECT 1 FROM user_roles r WHERE r.user_id = u.user_id AND r.role = ?1)
           ORDER BY u.username",
        )?;
        let rows = stmt
          .query_map(params![role], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        rows
          .into_iter()
          .map(|(id, username, name)| {
            Ok(User { id, username, name, roles: load_roles(conn, id)? })
          })
          .collect()
      })
      .await
  }

  // ── Departments ───────────────────────────────────────────────────────────

  async fn list_departments(&self, filter: DepartmentFilter) -> Result<Vec<Department>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.department_id, d.name, d.owner_user_id FROM departments d
           WHERE (?1 IS NULL OR d.owner_user_id = ?1)
             AND (?2 IS NULL OR EXISTS (
                   SELECT 1 FROM audit_assignments a
                   JOIN audit_cycles y ON y.cycle_id = a.cycle_id
                   WHERE a.department_id = d.department_id
                     AND a.auditor_user_id = ?2
                     AND (?3 IS NULL OR y.year = ?3)))
           ORDER BY d.name",
        )?;
        let rows = stmt
          .query_map(
            params![filter.owner_user_id, filter.auditor_user_id, filter.year],
            |row| {
              Ok(Department {
                id:            row.get(0)?,
                name:          row.get(1)?,
                owner_user_id: row.get(2)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_department(&self, id: i64) -> Result<Option<Department>> {
    self.with_conn(move |conn| load_department(conn, id)).await
  }

  async fn create_department(&self, input: NewDepartment) -> Result<Department> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_owner(&tx, input.owner_user_id)?;
        let name = input.name.trim().to_owned();
        tx.execute(
          "INSERT INTO departments (name, owner_user_id) VALUES (?1, ?2)",
          params![name, input.owner_user_id],
        )?;
        let department =
          Department { id: tx.last_insert_rowid(), name, owner_user_id: input.owner_user_id };
        tx.commit()?;
        Ok(department)
      })
      .await
  }

  async fn update_department(&self, id: i64, input: NewDepartment) -> Result<Department> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_owner(&tx, input.owner_user_id)?;
        let name = input.name.trim().to_owned();
        if tx.execute(
          "UPDATE departments SET name = ?1, owner_user_id = ?2 WHERE department_id = ?3",
          params![name, input.owner_user_id, id],
        )? == 0
        {
          return Err(CoreError::not_found("department", id).into());
        }
        tx.commit()?;
        Ok(Department { id, name, owner_user_id: input.owner_user_id })
      })
      .await
  }

  async fn set_department_owner(
    &self,
    id: i64,
    owner_user_id: Option<i64>,
  ) -> Result<Department> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_owner(&tx, owner_user_id)?;
        if tx.execute(
          "UPDATE departments SET owner_user_id = ?1 WHERE department_id = ?2",
          params![owner_user_id, id],
        )? == 0
        {
          return Err(CoreError::not_found("department", id).into());
        }
        let department = load_department(&tx, id)?
          .ok_or_else(|| CoreError::not_found("department", id))?;
        tx.commit()?;
        Ok(department)
      })
      .await
  }

  async fn delete_department(&self, id: i64) -> Result<()> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if load_department(&tx, id)?.is_none() {
          return Err(CoreError::not_found("department", id).into());
        }
        if exists(&tx, "SELECT 1 FROM standards WHERE department_id = ?1", params![id])? {
          return Err(
            CoreError::Conflict(format!("department {id} is referenced by standards")).into(),
          );
        }
        if exists(
          &tx,
          "SELECT 1 FROM audit_cycles WHERE department_id = ?1
           UNION ALL
           SELECT 1 FROM audit_assignments WHERE department_id = ?1",
          params![id],
        )? {
          return Err(
            CoreError::Conflict(format!("department {id} is referenced by audit cycles")).into(),
          );
        }
        tx.execute("DELETE FROM departments WHERE department_id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
      })
      .await
  }
}
